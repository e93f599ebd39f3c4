//! REPL front-end for the assistant.
//!
//! Stands in for the popup UI: reads one command per line, runs it through
//! the pipeline, and prints the response. Errors are rendered the same way
//! the UI renders them, as an assistant-style line carrying the error's
//! message, with a generic fallback. Slash commands handle setup
//! (credentials) and store maintenance locally, without a network call.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crm_copilot::{
    auth, templates, ChatRole, ConversationStore, CredentialBackend, FileBackend, Pipeline,
};

const ERROR_FALLBACK: &str = "An error occurred. Please try again.";

fn print_help() {
    println!("Setup commands:");
    println!("  /key <openai-api-key>      store the OpenAI API key");
    println!("  /login-url <redirect-uri>  print the Salesforce authorize URL");
    println!("  /login <redirect-url>      paste the post-login redirect URL");
    println!("  /templates                 list canned query templates");
    println!("  /clear                     clear conversation history");
    println!("  /quit                      exit");
    println!("Anything else is sent to the assistant.");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let credentials: Arc<dyn CredentialBackend> = Arc::new(FileBackend::new()?);
    let store_path = ConversationStore::default_path()?;
    let mut store = ConversationStore::load(&store_path)?;

    println!("crm-copilot: type a command, /help for setup");
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.split_once(' ').unwrap_or((input, "")) {
            ("/quit", _) | ("/exit", _) => break,
            ("/help", _) => print_help(),
            ("/templates", _) => {
                for (category, name) in templates::all() {
                    println!(
                        "{}/{} - {}",
                        category,
                        name,
                        templates::template_description(category, name)
                    );
                }
            }
            ("/clear", _) => {
                store.clear_messages();
                store.save(&store_path)?;
                println!("History cleared.");
            }
            ("/key", key) => match auth::store_api_key(&credentials, key) {
                Ok(()) => println!("API key stored."),
                Err(e) => println!("{}", e),
            },
            ("/login-url", redirect_uri) => {
                match auth::build_authorize_url(credentials.as_ref(), redirect_uri.trim()) {
                    Ok(url) => println!("Open this URL in a browser:\n{}", url),
                    Err(e) => println!("{}", e),
                }
            }
            ("/login", redirect_url) => match auth::complete_login(&credentials, redirect_url) {
                Ok(()) => println!("Connected to Salesforce."),
                Err(e) => println!("{}", e),
            },
            _ => {
                store.add_message(ChatRole::User, input);
                let reply = match Pipeline::from_credentials(credentials.clone()) {
                    Ok(pipeline) => pipeline.process_user_input(&mut store, input).await,
                    Err(e) => Err(e),
                };
                match reply {
                    Ok(response) => println!("{}", response),
                    Err(e) => {
                        let message = e.to_string();
                        if message.is_empty() {
                            println!("{}", ERROR_FALLBACK);
                        } else {
                            println!("{}", message);
                        }
                    }
                }
                store.save(&store_path)?;
            }
        }
    }

    store.save(&store_path)?;
    Ok(())
}
