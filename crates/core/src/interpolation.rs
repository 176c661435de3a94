//! `${Property}` expansion in command parameter values.

use indexmap::IndexMap;

/// Expand `${Name}` (and `$Name`) references using `lookup`.
///
/// References the lookup does not know are left in place so that a later
/// command, or the user reading the status messages, can still see them.
pub fn interpolate<F>(text: &str, lookup: F) -> String
where
    F: FnMut(&str) -> Option<String>,
{
    shellexpand::env_with_context_no_errors(text, lookup).into_owned()
}

/// Expand every raw parameter value of one command.
pub fn interpolate_parameters<F>(
    raw: &IndexMap<String, String>,
    mut lookup: F,
) -> IndexMap<String, String>
where
    F: FnMut(&str) -> Option<String>,
{
    raw.iter()
        .map(|(name, value)| (name.clone(), interpolate(value, &mut lookup)))
        .collect()
}
