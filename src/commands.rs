use anyhow::Result;
use colored::Colorize;
use futures::future::join_all;
use std::io::{BufRead, Write};

use crate::config::Config;
use crate::console::Console;
use crate::fetch::{FeedSource, load_feed};
use crate::format::format_channel;
use crate::store::{FeedOutcome, ProfileStore, StoreError};

pub const FAREWELL: &str = "Thank you for using Quaint RSS Feed Reader";

/// Where the session goes next
#[derive(Debug, PartialEq, Eq)]
enum Step {
    Entry,
    Login(String),
    CreateAccount,
    Done,
}

/// Drive the interactive session until it completes or input runs out.
///
/// With `profile_name` set the entry prompt is skipped and the session starts
/// by logging in as that profile.
pub async fn run_session<S, R, W>(
    profile_name: Option<String>,
    store: &mut ProfileStore,
    source: &S,
    console: &mut Console<R, W>,
    cfg: &Config,
) -> Result<()>
where
    S: FeedSource,
    R: BufRead,
    W: Write,
{
    let mut step = match profile_name {
        Some(name) => Step::Login(name),
        None => Step::Entry,
    };

    loop {
        step = match step {
            Step::Entry => cmd_entry(console)?,
            Step::Login(name) => cmd_login(store, source, console, cfg, &name).await?,
            Step::CreateAccount => cmd_create_account(store, source, console, cfg).await?,
            Step::Done => return Ok(()),
        };
    }
}

/// Ask whether the user already has a profile
fn cmd_entry<R: BufRead, W: Write>(console: &mut Console<R, W>) -> Result<Step> {
    loop {
        let Some(answer) = console.ask("Do you have a profile? Y/N")? else {
            return Ok(Step::Done);
        };

        match answer.trim().to_lowercase().as_str() {
            "y" => {
                let Some(name) =
                    console.ask("What is your profile name? (Profile name is case insensitive)")?
                else {
                    return Ok(Step::Done);
                };
                return Ok(Step::Login(name.trim().to_string()));
            }
            "n" => return Ok(Step::CreateAccount),
            _ => console.say("invalid input")?,
        }
    }
}

async fn cmd_login<S, R, W>(
    store: &mut ProfileStore,
    source: &S,
    console: &mut Console<R, W>,
    cfg: &Config,
    name: &str,
) -> Result<Step>
where
    S: FeedSource,
    R: BufRead,
    W: Write,
{
    let Some(profile) = store.find_by_name(name) else {
        tracing::info!(profile = name, "login with unknown profile");
        console.say(format!("No profile named '{name}' was found").red())?;
        return Ok(Step::Entry);
    };
    let profile_name = profile.name.clone();

    console.say(format!("Logged in! Welcome, {profile_name}\n"))?;
    print_feed_list(console, &profile.feeds)?;

    loop {
        let Some(answer) = console.ask("\nWould you like to add a new one? (Y/N)")? else {
            return Ok(Step::Done);
        };

        match answer.trim().to_lowercase().as_str() {
            "n" => break,
            "y" => {
                cmd_add_feeds(store, source, console, &profile_name).await?;
                break;
            }
            _ => console.say("invalid input")?,
        }
    }

    let feeds = current_feeds(store, &profile_name);
    cmd_read_all(source, console, cfg, &feeds).await?;
    Ok(Step::Done)
}

async fn cmd_create_account<S, R, W>(
    store: &mut ProfileStore,
    source: &S,
    console: &mut Console<R, W>,
    cfg: &Config,
) -> Result<Step>
where
    S: FeedSource,
    R: BufRead,
    W: Write,
{
    let profile_name = loop {
        let Some(name) = console.ask("Choose a profile Name (Please don't include spaces)")? else {
            return Ok(Step::Done);
        };

        match store.create(&name) {
            Ok(profile) => break profile.name.clone(),
            Err(StoreError::Profile(err)) => console.say(err.to_string().yellow())?,
            Err(err) => {
                tracing::warn!(profile = %name, error = %err, "could not save new profile");
                console.say(format!("Could not save profile {name}: {err}").red())?;
            }
        }
    };

    console.say(format!("Profile {profile_name} created").green())?;
    cmd_add_feeds(store, source, console, &profile_name).await?;

    let feeds = current_feeds(store, &profile_name);
    cmd_read_all(source, console, cfg, &feeds).await?;
    Ok(Step::Done)
}

/// Prompt for feed URLs and add the valid ones to the profile
async fn cmd_add_feeds<S, R, W>(
    store: &mut ProfileStore,
    source: &S,
    console: &mut Console<R, W>,
    profile_name: &str,
) -> Result<()>
where
    S: FeedSource,
    R: BufRead,
    W: Write,
{
    console.say("Let's add some feeds\n")?;

    let candidates = loop {
        let Some(answer) = console.ask(
            "What RSS feeds would you like to add to your account? \
             Please separate feeds with a comma ', ', or press n to skip:",
        )?
        else {
            return Ok(());
        };

        if answer.trim().eq_ignore_ascii_case("n") {
            return Ok(());
        }
        let candidates = split_feed_list(&answer);
        if !candidates.is_empty() {
            break candidates;
        }
        console.say("Please enter at least one feed URL, or n to skip")?;
    };

    let report = match store.add_feeds(profile_name, &candidates, source).await {
        Ok(report) => report,
        Err(err) => {
            tracing::warn!(profile = profile_name, error = %err, "could not save feeds");
            console.say(format!("Could not save your new feeds: {err}").red())?;
            return Ok(());
        }
    };

    for (url, outcome) in &report.outcomes {
        match outcome {
            FeedOutcome::Added => console.say(format!("{url} was added to your feeds").green())?,
            FeedOutcome::Duplicate => {
                console.say(format!("{url} is already in your feeds!").yellow())?
            }
            FeedOutcome::Invalid(err) => {
                console.say(format!("{url} is not a valid feed! ({err})").red())?
            }
        }
    }

    Ok(())
}

/// Fetch every feed and print up to the requested number of items from each.
///
/// Feeds are fetched concurrently but printed in list order. A feed that
/// fails to load is skipped with a warning.
async fn cmd_read_all<S, R, W>(
    source: &S,
    console: &mut Console<R, W>,
    cfg: &Config,
    feeds: &[String],
) -> Result<()>
where
    S: FeedSource,
    R: BufRead,
    W: Write,
{
    console.say("Reading Feeds\n")?;

    if feeds.is_empty() {
        console.say("You have no feeds to read yet.")?;
    } else {
        let question = format!(
            "How many news items per entry do you want? (Default {})",
            cfg.default_item_count
        );
        let count = console
            .ask(&question)?
            .map(|answer| parse_item_count(&answer, cfg.default_item_count))
            .unwrap_or(cfg.default_item_count);

        console.say("Loading feeds\n")?;
        let results = join_all(feeds.iter().map(|url| load_feed(source, url))).await;

        for (url, result) in feeds.iter().zip(results) {
            match result {
                Ok(channel) => {
                    for block in format_channel(&channel, count) {
                        console.say(block)?;
                    }
                }
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "skipping feed");
                    console.say(format!("Skipping {url}: {err}").yellow())?;
                }
            }
        }
    }

    console.say(FAREWELL)?;
    Ok(())
}

fn print_feed_list<R: BufRead, W: Write>(
    console: &mut Console<R, W>,
    feeds: &[String],
) -> Result<()> {
    console.say(format!("You have {} feeds:\n", feeds.len()))?;
    for (i, feed) in feeds.iter().enumerate() {
        console.say(format!("{}. {feed}", i + 1))?;
    }
    Ok(())
}

fn current_feeds(store: &ProfileStore, profile_name: &str) -> Vec<String> {
    store
        .find_by_name(profile_name)
        .map(|p| p.feeds.clone())
        .unwrap_or_default()
}

/// Split a comma-separated answer into trimmed, non-empty URLs
pub fn split_feed_list(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Items per feed. Anything that isn't a non-negative number, including a
/// negative one, means `default` rather than "every item".
pub fn parse_item_count(answer: &str, default: usize) -> usize {
    answer.trim().parse().unwrap_or(default)
}
