//! Canned SOQL command templates.
//!
//! A small library of ready-made queries the UI offers as shortcuts,
//! organized by category. Date-bounded templates are rendered against the
//! current date at lookup time; the description lookup is a pure function
//! with a fixed fallback for unknown pairs.

use chrono::{Datelike, Duration, NaiveDate, Utc};

pub const NO_DESCRIPTION: &str = "No description available";

const DATE_FMT: &str = "%Y-%m-%d";

/// First and last day of the quarter containing `date`.
fn quarter_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let start_month = ((date.month0() / 3) * 3) + 1;
    let start = NaiveDate::from_ymd_opt(date.year(), start_month, 1).expect("valid quarter start");
    let end = if start_month == 10 {
        NaiveDate::from_ymd_opt(date.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(date.year(), start_month + 3, 1)
    }
    .expect("valid next quarter start")
        - Duration::days(1);
    (start, end)
}

/// Quarter bounds for the quarter before the one containing `date`.
fn previous_quarter_bounds(date: NaiveDate) -> (NaiveDate, NaiveDate) {
    let (start, _) = quarter_bounds(date);
    quarter_bounds(start - Duration::days(1))
}

fn render(category: &str, name: &str, today: NaiveDate) -> Option<String> {
    let (q_start, q_end) = quarter_bounds(today);
    let (pq_start, pq_end) = previous_quarter_bounds(today);

    let soql = match (category, name) {
        ("opportunities", "byStage") => "SELECT StageName, COUNT(Id) total \
             FROM Opportunity WHERE IsClosed = false GROUP BY StageName"
            .to_string(),
        ("opportunities", "topByAmount") => "SELECT Name, Amount \
             FROM Opportunity WHERE IsClosed = false ORDER BY Amount DESC LIMIT 5"
            .to_string(),
        ("accounts", "noActivity") => format!(
            "SELECT Id, Name FROM Account WHERE LastActivityDate < {}",
            (today - Duration::days(30)).format(DATE_FMT)
        ),
        ("accounts", "topByRevenue") => "SELECT Name, AnnualRevenue \
             FROM Account WHERE AnnualRevenue != null ORDER BY AnnualRevenue DESC LIMIT 5"
            .to_string(),
        ("leads", "recentlyCreated") => "SELECT Id, Name, Company, Status \
             FROM Lead WHERE CreatedDate = LAST_N_DAYS:7"
            .to_string(),
        ("leads", "byStatus") => {
            "SELECT Status, COUNT(Id) total FROM Lead GROUP BY Status".to_string()
        }
        ("cases", "openByPriority") => "SELECT Priority, COUNT(Id) total \
             FROM Case WHERE IsClosed = false GROUP BY Priority"
            .to_string(),
        ("cases", "avgResolutionTime") => "SELECT AVG(ClosedDate - CreatedDate) avgTime \
             FROM Case WHERE IsClosed = true"
            .to_string(),
        ("kpis", "winRate") => "SELECT COUNT(Id) total, \
             SUM(CASE WHEN IsWon = true THEN 1 ELSE 0 END) won \
             FROM Opportunity WHERE CloseDate = THIS_MONTH"
            .to_string(),
        ("kpis", "quarterlyRevenue") => format!(
            "SELECT SUM(Amount) revenue FROM Opportunity \
             WHERE CloseDate >= {} AND CloseDate <= {} AND IsWon = true",
            q_start.format(DATE_FMT),
            q_end.format(DATE_FMT)
        ),
        ("kpis", "quarterComparison") => format!(
            "SELECT SUM(CASE WHEN CloseDate >= {qs} AND CloseDate <= {qe} \
             THEN Amount ELSE 0 END) thisQuarter, \
             SUM(CASE WHEN CloseDate >= {pqs} AND CloseDate <= {pqe} \
             THEN Amount ELSE 0 END) lastQuarter \
             FROM Opportunity WHERE IsWon = true",
            qs = q_start.format(DATE_FMT),
            qe = q_end.format(DATE_FMT),
            pqs = pq_start.format(DATE_FMT),
            pqe = pq_end.format(DATE_FMT)
        ),
        _ => return None,
    };
    Some(soql)
}

/// SOQL for a category/template pair, rendered against today's date.
pub fn template_query(category: &str, name: &str) -> Option<String> {
    render(category, name, Utc::now().date_naive())
}

/// All known category/template pairs, in display order.
pub fn all() -> &'static [(&'static str, &'static str)] {
    &[
        ("opportunities", "byStage"),
        ("opportunities", "topByAmount"),
        ("accounts", "noActivity"),
        ("accounts", "topByRevenue"),
        ("leads", "recentlyCreated"),
        ("leads", "byStatus"),
        ("cases", "openByPriority"),
        ("cases", "avgResolutionTime"),
        ("kpis", "winRate"),
        ("kpis", "quarterlyRevenue"),
        ("kpis", "quarterComparison"),
    ]
}

/// Human description for a category/template pair. Unknown pairs get the
/// fixed fallback string.
pub fn template_description(category: &str, name: &str) -> &'static str {
    match (category, name) {
        ("opportunities", "byStage") => "Shows a breakdown of open opportunities by stage",
        ("opportunities", "topByAmount") => "Lists the top 5 open opportunities by amount",
        ("accounts", "noActivity") => "Shows accounts with no activity in the last 30 days",
        ("accounts", "topByRevenue") => "Lists the top 5 accounts by annual revenue",
        ("leads", "recentlyCreated") => "Shows leads created in the last 7 days",
        ("leads", "byStatus") => "Shows a breakdown of leads by status",
        ("cases", "openByPriority") => "Shows open cases grouped by priority",
        ("cases", "avgResolutionTime") => "Calculates the average case resolution time",
        ("kpis", "winRate") => "Calculates the opportunity win rate for the current month",
        ("kpis", "quarterlyRevenue") => "Shows total revenue for the current quarter",
        ("kpis", "quarterComparison") => "Compares revenue between current and previous quarter",
        _ => NO_DESCRIPTION,
    }
}
