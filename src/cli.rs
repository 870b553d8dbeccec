//! CLI interface for modqueue.
//!
//! Stands in for the host platform: each invocation is one request, made by
//! the identity given with `--as` (an account) or `--ip` (an anonymous
//! visitor). Anonymous markers survive between invocations when a
//! `--session` id is passed.
//!
//! With `--dry-run`, commands run against a recording manager: nothing is
//! written, and the consequences that would have run are printed as JSON.

mod format;

use clap::{Args, Parser, Subcommand};

use crate::{
    action::{ActionHandler, ModerationAction},
    config::Config,
    consequence::{ConsequenceKind, ConsequenceManager, Outcome, RealManager, RecordingManager},
    context::{RequestContext, Session},
    intercept::{EditInterceptor, EditOutcome},
    model::{Content, EditAttempt, EntryStatus, Identity, PageIdentity},
    preload::PreloadResolver,
    storage::Storage,
};

use format::{describe_upsert, format_entry, format_log_entry};

/// Modqueue: hold edits for moderator review.
#[derive(Debug, Parser)]
#[command(name = "modqueue", after_long_help = WORKFLOW_HELP)]
pub struct Cli {
    /// Print the consequences instead of running them.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Session id; anonymous markers are kept per session.
    #[arg(long, global = true)]
    session: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

const WORKFLOW_HELP: &str = r#"Workflow: an anonymous edit, reviewed
  1. modqueue --session s1 edit --ip 10.0.0.7 --title "Lake Baikal" "Deepest lake."
  2. modqueue --session s1 preload --ip 10.0.0.7 --title "Lake Baikal"
  3. modqueue list
  4. modqueue action approve 1 --as Moderator

Merging instead of approving:
  modqueue merge 1 501 --as Moderator"#;

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Attempt an edit. Queued unless the submitter bypasses moderation.
    Edit {
        #[command(flatten)]
        who: Who,

        #[command(flatten)]
        page: PageArgs,

        /// Edit summary.
        #[arg(long, default_value = "")]
        summary: String,

        /// Section id, for section edits.
        #[arg(long, default_value = "")]
        section: String,

        /// New text of just the edited section. Carried in the queue-edit
        /// consequence for the host's own display; the queue stores only the
        /// full page text.
        #[arg(long, default_value = "")]
        section_text: String,

        #[arg(long)]
        minor: bool,

        #[arg(long)]
        bot: bool,

        /// Content model. Only text models are moderated.
        #[arg(long, default_value = "wikitext")]
        model: String,

        /// Full new text of the page.
        text: String,
    },

    /// Show the submitter's own pending edit of a page, if any.
    Preload {
        #[command(flatten)]
        who: Who,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Run a moderator action: approve, reject, or merge.
    Action {
        /// Action name.
        name: String,

        /// Entry id.
        mod_id: i64,

        /// Moderator account.
        #[arg(long = "as")]
        moderator: String,

        /// Revision that absorbed the entry. Required by `merge`.
        #[arg(long)]
        revid: Option<i64>,
    },

    /// Record that a saved revision merged a pending entry.
    Merge {
        mod_id: i64,
        rev_id: i64,

        /// Moderator account.
        #[arg(long = "as")]
        moderator: String,
    },

    /// List entries, pending by default.
    List {
        /// pending, approved, rejected, or merged.
        #[arg(long, default_value = "pending")]
        status: String,
    },

    /// Show the moderation log.
    Log,
}

/// Who is making the request.
#[derive(Debug, Args)]
pub struct Who {
    /// Account name.
    #[arg(long = "as", conflicts_with = "ip")]
    user: Option<String>,

    /// Address of an anonymous visitor.
    #[arg(long, default_value = "127.0.0.1")]
    ip: String,
}

impl Who {
    fn identity(&self) -> Identity {
        match &self.user {
            Some(name) => Identity::registered(name),
            None => Identity::anonymous(&self.ip),
        }
    }
}

#[derive(Debug, Args)]
pub struct PageArgs {
    #[arg(long, default_value_t = 0)]
    namespace: i32,

    #[arg(long)]
    title: String,
}

impl PageArgs {
    fn page(&self) -> PageIdentity {
        PageIdentity::new(self.namespace, &self.title)
    }
}

/// Run the CLI, returning an error message on failure.
pub fn run(config: &Config, storage: &Storage) -> Result<(), String> {
    let cli = Cli::parse();

    let session = match &cli.session {
        Some(id) => Session::from_values(
            storage
                .load_session(id)
                .map_err(|e| format!("failed to load session: {e}"))?,
        ),
        None => Session::new(),
    };
    let context = RequestContext::new(requester(&cli.command), session.clone());
    context.clone().install_main();

    let recording = RecordingManager::new();
    for kind in [
        ConsequenceKind::MarkAsMerged,
        ConsequenceKind::MarkAsApproved,
        ConsequenceKind::MarkAsRejected,
    ] {
        recording.mock_result(kind, Outcome::Flag(true));
    }
    let real = RealManager::new(storage).with_context(context);
    let manager: &dyn ConsequenceManager = if cli.dry_run { &recording } else { &real };

    match &cli.command {
        Command::Edit {
            who,
            page,
            summary,
            section,
            section_text,
            minor,
            bot,
            model,
            text,
        } => {
            let content = if model == "wikitext" || model == "text" {
                Content::Text {
                    model: model.clone(),
                    text: text.clone(),
                }
            } else {
                Content::Other {
                    model: model.clone(),
                }
            };
            let attempt = EditAttempt {
                page: page.page(),
                identity: who.identity(),
                content,
                summary: summary.clone(),
                section: section.clone(),
                section_text: section_text.clone(),
                bot: *bot,
                minor: *minor,
            };
            cmd_edit(config, manager, attempt)?;
        }
        Command::Preload { page, .. } => cmd_preload(storage, manager, &page.page())?,
        Command::Action {
            name,
            mod_id,
            moderator,
            revid,
        } => {
            let action = name
                .parse::<ModerationAction>()
                .map_err(|e| e.to_string())?;
            cmd_action(storage, manager, action, *mod_id, moderator, *revid)?;
        }
        Command::Merge {
            mod_id,
            rev_id,
            moderator,
        } => cmd_merge(config, storage, manager, *mod_id, *rev_id, moderator)?,
        Command::List { status } => cmd_list(storage, status)?,
        Command::Log => cmd_log(storage)?,
    }

    if cli.dry_run {
        let json = serde_json::to_string_pretty(&recording.consequences())
            .map_err(|e| format!("failed to serialize consequences: {e}"))?;
        println!("{json}");
    } else if let Some(id) = &cli.session {
        storage
            .save_session(id, &session.values())
            .map_err(|e| format!("failed to save session: {e}"))?;
    }

    Ok(())
}

/// The identity a command acts as.
fn requester(command: &Command) -> Identity {
    match command {
        Command::Edit { who, .. } | Command::Preload { who, .. } => who.identity(),
        Command::Action { moderator, .. } | Command::Merge { moderator, .. } => {
            Identity::registered(moderator)
        }
        Command::List { .. } | Command::Log => Identity::anonymous("127.0.0.1"),
    }
}

fn cmd_edit(
    config: &Config,
    manager: &dyn ConsequenceManager,
    attempt: EditAttempt,
) -> Result<(), String> {
    let outcome = EditInterceptor::new(&config.moderation, manager)
        .intercept(attempt)
        .map_err(|e| format!("failed to queue edit: {e}"))?;

    match outcome {
        EditOutcome::Bypassed => eprintln!("Not moderated: save the edit directly"),
        EditOutcome::Queued { redirect, entry } => {
            if let Some(entry) = entry {
                eprintln!("{}", describe_upsert(&entry));
            }
            let query: Vec<String> = redirect
                .query()
                .iter()
                .map(|(k, v)| format!("{k}={v}"))
                .collect();
            println!("{}?{}", redirect.page, query.join("&"));
        }
    }
    Ok(())
}

fn cmd_preload(
    storage: &Storage,
    manager: &dyn ConsequenceManager,
    page: &PageIdentity,
) -> Result<(), String> {
    let pending = PreloadResolver::new(storage, manager)
        .find_pending_edit(page)
        .map_err(|e| format!("failed to look up pending edit: {e}"))?;

    match pending {
        Some(edit) => {
            let json = serde_json::to_string_pretty(&edit)
                .map_err(|e| format!("failed to serialize pending edit: {e}"))?;
            println!("{json}");
        }
        None => eprintln!("No pending edit of {page}"),
    }
    Ok(())
}

fn cmd_action(
    storage: &Storage,
    manager: &dyn ConsequenceManager,
    action: ModerationAction,
    mod_id: i64,
    moderator: &str,
    rev_id: Option<i64>,
) -> Result<(), String> {
    let handler = ActionHandler::new(storage, manager);
    let moderator = Identity::registered(moderator);

    let result = match action {
        ModerationAction::Approve => handler.approve(mod_id, &moderator),
        ModerationAction::Reject => handler.reject(mod_id, &moderator),
        ModerationAction::Merge => {
            let rev_id = rev_id.ok_or("merge requires a revision id (--revid)")?;
            handler.merge(mod_id, rev_id, &moderator)
        }
    };
    result.map_err(|e| format!("{} failed: {e}", action.as_str()))
}

/// The host-side merge hook: a moderator saved revision `rev_id`, which
/// absorbed entry `mod_id`.
fn cmd_merge(
    config: &Config,
    storage: &Storage,
    manager: &dyn ConsequenceManager,
    mod_id: i64,
    rev_id: i64,
    moderator: &str,
) -> Result<(), String> {
    let entry = storage
        .load_entry(mod_id)
        .map_err(|e| format!("failed to load entry: {e}"))?
        .ok_or_else(|| format!("pending entry not found: {mod_id}"))?;

    EditInterceptor::new(&config.moderation, manager)
        .on_merge_saved(
            mod_id,
            rev_id,
            &Identity::registered(moderator),
            &entry.fields.page,
        )
        .map_err(|e| format!("merge failed: {e}"))
}

fn cmd_list(storage: &Storage, status: &str) -> Result<(), String> {
    let status = status.parse::<EntryStatus>()?;
    let entries = storage
        .list_entries(status)
        .map_err(|e| format!("failed to list entries: {e}"))?;

    if entries.is_empty() {
        println!("No {status} entries");
    }
    for entry in &entries {
        println!("{}", format_entry(entry));
    }

    if status == EntryStatus::Pending {
        let oldest = storage
            .pending_time()
            .map_err(|e| format!("failed to read pending time: {e}"))?;
        if let Some(oldest) = oldest {
            eprintln!("Oldest pending since {oldest}");
        }
    }
    Ok(())
}

fn cmd_log(storage: &Storage) -> Result<(), String> {
    let log = storage
        .load_log()
        .map_err(|e| format!("failed to load log: {e}"))?;

    if log.is_empty() {
        println!("No log entries");
    }
    for entry in &log {
        println!("{}", format_log_entry(entry));
    }
    Ok(())
}
