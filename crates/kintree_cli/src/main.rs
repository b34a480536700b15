//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `kintree_core` linkage.
//! - Print the loaded tree as deterministic text for quick local checks.
//!
//! Usage: `kintree_cli [admin|restricted-viewer] [--db <path>]`

use kintree_core::{
    parse_session_mode, BlobStore, Feedback, MemoryBlobStore, PersonCard, SessionMode,
    SqliteBlobStore, TreeSession, TreeSnapshot, ViewBinding,
};
use std::process::ExitCode;

struct TextView;

impl ViewBinding for TextView {
    fn render(&mut self, snapshot: &TreeSnapshot) {
        println!("tree persons={}", snapshot.len());
        for person in snapshot.persons() {
            let rels = &person.relationships;
            let partners = rels
                .partners
                .iter()
                .map(|link| match &link.marriage_date {
                    Some(date) => format!("{}@{date}", link.id),
                    None => link.id.to_string(),
                })
                .collect::<Vec<_>>();
            let gender = person.gender().map_or("?", |gender| gender.as_str());
            println!(
                "  {} {} ({gender}) parents=[{}] children=[{}] spouses=[{}]",
                person.id,
                person.display_name(),
                join_ids(rels.parents.iter()),
                join_ids(rels.children.iter()),
                partners.join(",")
            );
        }
    }

    fn show_person(&mut self, card: &PersonCard) {
        println!("{}: {}", card.title, card.person.display_name());
    }

    fn report(&mut self, feedback: &Feedback) {
        eprintln!(
            "error operation={} kind={} message={}",
            feedback.operation,
            feedback.kind.as_str(),
            feedback.message
        );
    }
}

fn join_ids<'a>(ids: impl Iterator<Item = &'a kintree_core::PersonId>) -> String {
    ids.map(|id| id.as_str()).collect::<Vec<_>>().join(",")
}

struct CliArgs {
    mode: SessionMode,
    db_path: Option<String>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Result<CliArgs, String> {
    let mut mode = SessionMode::RestrictedViewer;
    let mut db_path = None;
    while let Some(arg) = args.next() {
        if arg == "--db" {
            db_path = Some(args.next().ok_or("--db requires a path")?);
        } else {
            mode = parse_session_mode(arg.as_str()).map_err(|err| err.to_string())?;
        }
    }
    Ok(CliArgs { mode, db_path })
}

fn main() -> ExitCode {
    println!("kintree_core ping={}", kintree_core::ping());
    println!("kintree_core version={}", kintree_core::core_version());

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{err}");
            return ExitCode::from(2);
        }
    };

    let blobs: Box<dyn BlobStore> = match args.db_path {
        Some(path) => match SqliteBlobStore::open(&path) {
            Ok(store) => Box::new(store),
            Err(err) => {
                eprintln!("failed to open `{path}`: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => Box::new(MemoryBlobStore::new()),
    };

    match TreeSession::start(args.mode, blobs, TextView) {
        Ok(session) => {
            println!(
                "session mode={} source={}",
                session.mode(),
                session.source().as_str()
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("failed to start session: {err}");
            ExitCode::FAILURE
        }
    }
}
