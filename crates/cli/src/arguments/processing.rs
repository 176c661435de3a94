use geoflow_core::error::Error::ParameterFormat;
use geoflow_core::error::Result;
use geoflow_core::file_handling::validate_id;
use indexmap::IndexMap;

/// Parse `Name=Value` property assignments given on the command line.
///
/// The value is everything after the first `=`, so values may themselves
/// contain `=`. Later assignments to the same name win.
///
/// # Errors
///
/// Returns an error if an assignment has no `=` or its name is not a valid
/// property name.
pub fn parse_property_assignments(assignments: &[String]) -> Result<IndexMap<String, String>> {
    let mut properties = IndexMap::new();

    for assignment in assignments {
        let Some((name, value)) = assignment.split_once('=') else {
            return Err(ParameterFormat(assignment.to_string()));
        };

        let name = name.trim();
        if validate_id(name).is_err() {
            return Err(ParameterFormat(assignment.to_string()));
        }

        properties.insert(name.to_string(), value.to_string());
    }

    Ok(properties)
}
