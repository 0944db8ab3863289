//! A simple program that chats with the journal companion in the terminal.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::pin::pin;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use journal_chat::core::model::{Message, Role};
use journal_chat::core::{Error, StoreSnapshot};
use journal_chat::{Command, HELP, SessionBuilder};
use journal_sync_http_api::{HttpApiConfigBuilder, HttpConversationApi};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::time::sleep;

const BAR_CHAR: &str = "▎";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let Ok(token) = env::var("JOURNAL_API_TOKEN") else {
        eprintln!("JOURNAL_API_TOKEN environment variable is not set");
        return;
    };
    let mut config = HttpApiConfigBuilder::with_token(token);
    if let Ok(base_url) = env::var("JOURNAL_API_URL") {
        config = config.with_base_url(base_url);
    }
    let api = HttpConversationApi::new(config.build());
    let session = SessionBuilder::with_api(api).build();

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let mut view = View::default();
    let started = with_spinner(
        &progress_style,
        "📖 Opening your journal...",
        session.start(),
    )
    .await;
    if let Err(err) = started {
        print_error(&err);
        if err.needs_reauth() {
            return;
        }
    }
    view.render(&session.snapshot());

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{}", err.bright_yellow());
                continue;
            }
        };

        let message = match &command {
            Command::Quit => break,
            Command::Help => {
                println!("{HELP}");
                continue;
            }
            Command::List => {
                print_list(&session.snapshot());
                continue;
            }
            Command::Send(_) => "🤔 Thinking...",
            Command::Switch(_) => "📖 Opening...",
            _ => "Working...",
        };

        let result =
            with_spinner(&progress_style, message, session.execute(command))
                .await;
        if let Err(err) = result {
            print_error(&err);
        }
        view.render(&session.snapshot());
    }

    session.close().await;
}

/// Drives `fut` to completion while showing a spinner.
async fn with_spinner<T>(
    style: &ProgressStyle,
    message: &'static str,
    fut: impl Future<Output = T>,
) -> T {
    let progress_bar = ProgressBar::new_spinner();
    progress_bar.set_style(style.clone());
    progress_bar.set_message(message);

    let mut fut = pin!(fut);
    let output = loop {
        select! {
            output = &mut fut => break output,
            _ = sleep(Duration::from_millis(100)) => progress_bar.inc(1),
        }
    };

    // Finish the progress bar before printing anything else.
    progress_bar.finish_and_clear();
    output
}

/// Remembers what has been printed so only new messages are shown.
#[derive(Default)]
struct View {
    conversation_id: Option<String>,
    shown: usize,
}

impl View {
    fn render(&mut self, snapshot: &StoreSnapshot) {
        let current_id = snapshot.current_id();
        if current_id != self.conversation_id.as_deref() {
            self.conversation_id = current_id.map(str::to_owned);
            self.shown = 0;
            match &snapshot.current_conversation {
                Some(conversation) => println!(
                    "\n{} {}",
                    "#".bright_black(),
                    display_title(&conversation.title).bold()
                ),
                None => println!("{}", "No conversation is open.".dimmed()),
            }
        }

        // The history was reloaded with fewer entries.
        if snapshot.messages.len() < self.shown {
            self.shown = 0;
        }
        for message in &snapshot.messages[self.shown..] {
            print_message(message);
        }
        self.shown = snapshot.messages.len();
    }
}

fn print_message(message: &Message) {
    if message.is_placeholder() {
        return;
    }
    match message.role {
        Role::User => println!(
            "{}🙂 {}",
            BAR_CHAR.bright_green(),
            message.content.bright_white()
        ),
        Role::Assistant => println!(
            "{}🤖 {}",
            BAR_CHAR.bright_cyan(),
            message.content.bright_white()
        ),
        Role::System => println!(
            "{}{}",
            BAR_CHAR.bright_black(),
            message.content.dimmed()
        ),
    }
}

fn print_list(snapshot: &StoreSnapshot) {
    if snapshot.show_archived {
        println!("{}", "Archived conversations".bold());
    }
    if snapshot.conversations.is_empty() {
        println!("{}", "Nothing here yet.".dimmed());
        return;
    }
    for conversation in &snapshot.conversations {
        let marker = if Some(conversation.id.as_str()) == snapshot.current_id()
        {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {} {}  {}",
            conversation.id.bright_yellow(),
            display_title(&conversation.title),
            format!(
                "{} · {} message(s)",
                conversation.updated_at.format("%Y-%m-%d %H:%M"),
                conversation.message_count
            )
            .dimmed()
        );
        if let Some(preview) = &conversation.last_message {
            println!("    {}", preview.content.dimmed());
        }
    }
}

fn print_error(err: &Error) {
    eprintln!("{} {err}", "error:".bright_red().bold());
    if err.needs_reauth() {
        eprintln!("check the JOURNAL_API_TOKEN environment variable");
    }
}

#[inline]
fn display_title(title: &str) -> &str {
    if title.trim().is_empty() {
        "Untitled"
    } else {
        title
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(count) => {
            if count == 0 {
                return None;
            }
            Some(line)
        }
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}
