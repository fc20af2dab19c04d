use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime};

/// Formats a backend timestamp as `YYYY-MM-DD HH:MM`.
///
/// The backend emits RFC 3339 values, but naive `YYYY-MM-DDTHH:MM:SS[.ffffff]`
/// values show up for rows written without a timezone. Anything else is echoed
/// back trimmed.
pub(crate) fn display_timestamp(raw: &str) -> String {
    let value = raw.trim();
    let display = format_description!("[year]-[month]-[day] [hour]:[minute]");

    if let Ok(parsed) = OffsetDateTime::parse(value, &Rfc3339)
        && let Ok(out) = parsed.format(&display)
    {
        return out;
    }

    let naive = format_description!(
        "[year]-[month]-[day]T[hour]:[minute]:[second][optional [.[subsecond]]]"
    );
    if let Ok(parsed) = PrimitiveDateTime::parse(value, &naive)
        && let Ok(out) = parsed.format(&display)
    {
        return out;
    }

    value.to_string()
}
