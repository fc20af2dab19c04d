use std::sync::OnceLock;

use minijinja::{Environment, context};

use crate::entities::apartment::{Apartment, GeoPoint};
use crate::entities::location::Location;
use crate::entities::profile::Profile;
use crate::entities::recent::RecentSearch;
use crate::error::AptSearchError;
use crate::map::Viewport;
use crate::search::{SearchState, gate};

static ENV: OnceLock<Environment<'static>> = OnceLock::new();

#[derive(serde::Serialize)]
struct ApartmentRow<'a> {
    apt_id: &'a str,
    apt_name: &'a str,
    area: String,
    address: &'a str,
    coords: Option<String>,
    pin: Option<String>,
}

impl<'a> ApartmentRow<'a> {
    fn new(apartment: &'a Apartment, pins: Option<&Viewport>) -> Self {
        let pin = match (pins, apartment.location) {
            (Some(viewport), Some(point)) => {
                let screen = viewport.project(point);
                let mut label = format!("{:.1}%, {:.1}%", screen.x, screen.y);
                if !screen.is_visible() {
                    label.push_str(" (off-screen)");
                }
                Some(label)
            }
            _ => None,
        };
        Self {
            apt_id: &apartment.apt_id,
            apt_name: &apartment.apt_name,
            area: apartment.area_label(),
            address: &apartment.address,
            coords: apartment.location.map(format_point),
            pin,
        }
    }
}

#[derive(serde::Serialize)]
struct LocationRow<'a> {
    id: &'a str,
    name: &'a str,
    location_type: &'a str,
    full_name: &'a str,
    center: Option<String>,
}

/// `RecentSearch` serializes `kind` as `type`; templates use the field name.
#[derive(serde::Serialize)]
struct RecentRow<'a> {
    id: &'a str,
    query: &'a str,
    kind: &'a str,
    searched_at: &'a str,
}

fn format_point(point: GeoPoint) -> String {
    format!("{:.6}, {:.6}", point.lat, point.lng)
}

fn env() -> Result<&'static Environment<'static>, AptSearchError> {
    if let Some(env) = ENV.get() {
        return Ok(env);
    }

    let mut env = Environment::new();
    env.set_trim_blocks(true);
    env.set_lstrip_blocks(true);
    env.add_filter("truncate", |s: String, max_chars: usize| -> String {
        if s.chars().count() <= max_chars {
            return s;
        }
        if max_chars == 0 {
            return "…".to_string();
        }
        let mut out: String = s.chars().take(max_chars).collect();
        out.truncate(out.trim_end().len());
        out.push('…');
        out
    });
    // Table cells cannot hold pipes or line breaks.
    env.add_filter("cell", |s: String| -> String {
        s.replace('|', "\\|")
            .replace(['\r', '\n'], " ")
            .trim()
            .to_string()
    });
    env.add_filter("datetime", |s: String| -> String {
        crate::utils::date::display_timestamp(&s)
    });
    env.add_template(
        "apartment_search.md.j2",
        include_str!("../../templates/apartment_search.md.j2"),
    )?;
    env.add_template(
        "search_state.md.j2",
        include_str!("../../templates/search_state.md.j2"),
    )?;
    env.add_template(
        "location_search.md.j2",
        include_str!("../../templates/location_search.md.j2"),
    )?;
    env.add_template(
        "recent_searches.md.j2",
        include_str!("../../templates/recent_searches.md.j2"),
    )?;
    env.add_template("profile.md.j2", include_str!("../../templates/profile.md.j2"))?;

    Ok(ENV.get_or_init(|| env))
}

/// Renders a one-shot search. With `pins`, each located result also gets its
/// map placement in that viewport.
pub fn apartment_search_markdown(
    query: &str,
    limit: u32,
    results: &[Apartment],
    pins: Option<&Viewport>,
) -> Result<String, AptSearchError> {
    let rows = results
        .iter()
        .map(|apartment| ApartmentRow::new(apartment, pins))
        .collect::<Vec<_>>();
    let tmpl = env()?.get_template("apartment_search.md.j2")?;
    Ok(tmpl.render(context! {
        query => query,
        limit => limit,
        count => rows.len(),
        results => rows,
        pins => pins.is_some(),
    })?)
}

pub fn search_state_markdown(
    state: &SearchState,
    min_chars: usize,
) -> Result<String, AptSearchError> {
    let rows = state
        .results
        .iter()
        .map(|apartment| ApartmentRow::new(apartment, None))
        .collect::<Vec<_>>();
    let searchable = matches!(
        gate::check(&state.query, min_chars),
        gate::GateDecision::Dispatch(_)
    );
    let tmpl = env()?.get_template("search_state.md.j2")?;
    Ok(tmpl.render(context! {
        query => state.query.trim(),
        limit => state.limit.get(),
        loading => state.loading,
        error => state.error.as_deref(),
        count => rows.len(),
        results => rows,
        searchable => searchable,
        min_chars => min_chars,
    })?)
}

pub fn location_search_markdown(
    query: &str,
    results: &[Location],
) -> Result<String, AptSearchError> {
    let rows = results
        .iter()
        .map(|location| LocationRow {
            id: &location.id,
            name: &location.name,
            location_type: &location.location_type,
            full_name: &location.full_name,
            center: location.center.map(format_point),
        })
        .collect::<Vec<_>>();
    let tmpl = env()?.get_template("location_search.md.j2")?;
    Ok(tmpl.render(context! {
        query => query,
        results => rows,
    })?)
}

pub fn recent_searches_markdown(results: &[RecentSearch]) -> Result<String, AptSearchError> {
    let rows = results
        .iter()
        .map(|search| RecentRow {
            id: &search.id,
            query: &search.query,
            kind: &search.kind,
            searched_at: &search.searched_at,
        })
        .collect::<Vec<_>>();
    let tmpl = env()?.get_template("recent_searches.md.j2")?;
    Ok(tmpl.render(context! {
        results => rows,
    })?)
}

pub fn profile_markdown(profile: Option<&Profile>) -> Result<String, AptSearchError> {
    let tmpl = env()?.get_template("profile.md.j2")?;
    Ok(tmpl.render(context! {
        profile => profile,
        token_env => crate::sources::TOKEN_ENV,
    })?)
}
