use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::entities::apartment::Apartment;
use crate::entities::location::LocationType;
use crate::entities::profile::ProfileUpdate;
use crate::error::AptSearchError;
use crate::map::{ScreenPoint, Viewport};
use crate::render;
use crate::search::executor::{self, Resolution};
use crate::search::gate::{self, GateDecision};
use crate::search::state::{SEARCH_FAILED_MESSAGE, connection_error_message};
use crate::search::{Alert, MIN_QUERY_CHARS, ResultLimit};
use crate::sources::apartments::ApartmentSearchClient;
use crate::sources::auth::{ProfileClient, Session};
use crate::sources::{SERVER_BASE, SERVER_BASE_ENV, env_base};

pub mod health;
pub mod watch;

#[derive(Parser, Debug)]
#[command(
    name = "aptsearch",
    version,
    about = "Search apartments, neighbourhoods and your recent searches"
)]
pub struct Cli {
    /// Print JSON instead of markdown
    #[arg(long, global = true)]
    pub json: bool,

    /// Search API base URL (default: $APTSEARCH_SEARCH_BASE or http://localhost:8000/api/v1/search)
    #[arg(long, global = true, value_name = "URL")]
    pub search_base: Option<String>,

    /// Auth API base URL (default: $APTSEARCH_AUTH_BASE or http://localhost:8000/api/v1/auth)
    #[arg(long, global = true, value_name = "URL")]
    pub auth_base: Option<String>,

    /// Server root used by `health` (default: $APTSEARCH_SERVER_BASE or http://localhost:8000)
    #[arg(long, global = true, value_name = "URL")]
    pub server_base: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search apartments once by name or address
    Search {
        query: String,

        /// Number of results: 10, 20, 30 or 50
        #[arg(long, default_value = "10")]
        limit: ResultLimit,

        /// Add each result's map pin position (percent of the default viewport)
        #[arg(long)]
        pins: bool,
    },

    /// Search as you type: each stdin line replaces the query
    Watch {
        /// Number of results: 10, 20, 30 or 50
        #[arg(long, default_value = "10")]
        limit: ResultLimit,

        /// Quiet period after the last change before searching
        #[arg(long, default_value = "500")]
        debounce_ms: u64,
    },

    /// Search districts and neighbourhoods
    Locations {
        query: String,

        /// Restrict to one administrative level
        #[arg(long = "type", value_enum)]
        location_type: Option<LocationType>,
    },

    /// Recent searches of the signed-in account
    Recent {
        #[command(subcommand)]
        command: RecentCommand,
    },

    /// Profile of the signed-in account
    Profile {
        #[command(subcommand)]
        command: ProfileCommand,
    },

    /// Check that the server and search endpoints respond
    Health,
}

#[derive(Subcommand, Debug)]
pub enum RecentCommand {
    /// List recent searches, newest first
    List {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Delete one recent search by id
    Delete { id: String },
}

#[derive(Subcommand, Debug)]
pub enum ProfileCommand {
    /// Show the signed-in profile
    Show,
    /// Change nickname and/or profile image
    Update {
        /// 2 to 20 characters
        #[arg(long)]
        nickname: Option<String>,

        /// Image URL, at most 500 characters
        #[arg(long)]
        image_url: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct PinOutput<'a> {
    apt_id: &'a str,
    #[serde(flatten)]
    position: ScreenPoint,
    visible: bool,
}

#[derive(Debug, Serialize)]
struct SearchOutput<'a> {
    query: &'a str,
    limit: u32,
    count: usize,
    results: &'a [Apartment],
    #[serde(skip_serializing_if = "Option::is_none")]
    pins: Option<Vec<PinOutput<'a>>>,
}

fn search_client(base: Option<String>) -> Result<ApartmentSearchClient, AptSearchError> {
    match base {
        Some(base) => ApartmentSearchClient::with_base(base),
        None => ApartmentSearchClient::new(),
    }
}

fn profile_client(base: Option<String>) -> Result<ProfileClient, AptSearchError> {
    match base {
        Some(base) => ProfileClient::with_base(base),
        None => ProfileClient::new(),
    }
}

/// One-shot search: same gate and outcome handling as the debounced
/// controller, minus the timer.
async fn search_once(
    client: &ApartmentSearchClient,
    query: &str,
    limit: ResultLimit,
    pins: bool,
    json: bool,
) -> anyhow::Result<String> {
    let GateDecision::Dispatch(query) = gate::check(query, MIN_QUERY_CHARS) else {
        return Err(AptSearchError::InvalidArgument(
            Alert::query_too_short(MIN_QUERY_CHARS).message,
        )
        .into());
    };

    let results = match executor::resolve(client.apartments(&query, limit.get()).await) {
        Resolution::Results(results) => results,
        Resolution::Rejected => {
            return Err(AptSearchError::Api {
                api: "search".into(),
                message: SEARCH_FAILED_MESSAGE.into(),
            }
            .into());
        }
        Resolution::Failed(detail) => {
            let alert = Alert::connection_error(client.base());
            return Err(anyhow::anyhow!(
                "{}\n\n{}",
                connection_error_message(&detail),
                alert.message
            ));
        }
    };

    let viewport = pins.then(Viewport::default);
    if json {
        let pins = viewport.map(|viewport| {
            results
                .iter()
                .filter_map(|apartment| {
                    let position = viewport.project(apartment.location?);
                    Some(PinOutput {
                        apt_id: &apartment.apt_id,
                        visible: position.is_visible(),
                        position,
                    })
                })
                .collect()
        });
        return Ok(render::json::to_pretty(&SearchOutput {
            query: &query,
            limit: limit.get(),
            count: results.len(),
            results: &results,
            pins,
        })?);
    }
    Ok(render::markdown::apartment_search_markdown(
        &query,
        limit.get(),
        &results,
        viewport.as_ref(),
    )?)
}

/// Runs a parsed command and returns what should be printed to stdout.
///
/// # Errors
///
/// Returns an error when arguments are invalid, the backend cannot be reached
/// or answers with an error, or output cannot be rendered.
pub async fn run(cli: Cli) -> anyhow::Result<String> {
    let Cli {
        json,
        search_base,
        auth_base,
        server_base,
        command,
    } = cli;

    match command {
        Commands::Search {
            query,
            limit,
            pins,
        } => {
            let client = search_client(search_base)?;
            search_once(&client, &query, limit, pins, json).await
        }
        Commands::Watch { limit, debounce_ms } => {
            let client = search_client(search_base)?;
            watch::run(client, limit, Duration::from_millis(debounce_ms), json).await
        }
        Commands::Locations {
            query,
            location_type,
        } => {
            let client = search_client(search_base)?;
            let results = client.locations(&query, location_type).await?;
            if json {
                return Ok(render::json::to_pretty(&results)?);
            }
            Ok(render::markdown::location_search_markdown(
                query.trim(),
                &results,
            )?)
        }
        Commands::Recent { command } => {
            let client = search_client(search_base)?;
            let session = Session::from_env();
            match command {
                RecentCommand::List { limit } => {
                    let results = client.recent(session.as_ref(), limit).await?;
                    if json {
                        return Ok(render::json::to_pretty(&results)?);
                    }
                    Ok(render::markdown::recent_searches_markdown(&results)?)
                }
                RecentCommand::Delete { id } => {
                    let message = client.delete_recent(session.as_ref(), &id).await?;
                    if json {
                        return Ok(render::json::to_pretty(&serde_json::json!({
                            "id": id.trim(),
                            "message": message,
                        }))?);
                    }
                    Ok(message)
                }
            }
        }
        Commands::Profile { command } => {
            let client = profile_client(auth_base)?;
            let session = Session::from_env();
            let profile = match command {
                ProfileCommand::Show => client.fetch(session.as_ref()).await?,
                ProfileCommand::Update {
                    nickname,
                    image_url,
                } => {
                    let update = ProfileUpdate {
                        nickname,
                        profile_image_url: image_url,
                    };
                    Some(client.update(session.as_ref(), &update).await?)
                }
            };
            if json {
                return Ok(render::json::to_pretty(&profile)?);
            }
            Ok(render::markdown::profile_markdown(profile.as_ref())?)
        }
        Commands::Health => {
            let search_base = search_client(search_base)?.base().to_string();
            let server_base = server_base
                .unwrap_or_else(|| env_base(SERVER_BASE, SERVER_BASE_ENV).into_owned());
            let report = health::check(&server_base, &search_base).await?;
            let output = if json {
                render::json::to_pretty(&report)?
            } else {
                report.to_markdown()
            };
            if !report.all_healthy() {
                anyhow::bail!("{output}");
            }
            Ok(output)
        }
    }
}
