use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error with {} file at path `{}`: {}", .file_description, .path, .original)]
    Io {
        file_description: String,
        path: String,
        original: std::io::Error,
    },

    #[error("Error {} {} file at `{}`: {}", .action, .file_description, .path, .original)]
    Yaml {
        action: String,
        file_description: String,
        path: String,
        original: serde_yaml::Error,
    },

    #[error("Error parsing GeoJSON file at `{}`: {}", .path, .original)]
    Json {
        path: String,
        original: serde_json::Error,
    },

    #[error("GeoJSON file at `{}` is not usable: {}", .path, .reason)]
    InvalidGeoJson { path: String, reason: String },

    #[error("Error with delimited file at `{}`: {}", .path, .original)]
    Csv { path: String, original: csv::Error },

    #[error("HTTP request failed: {}", .0)]
    Http(#[from] reqwest::Error),

    #[error("HTTP request to `{}` returned status {}", .0, .1)]
    HttpStatus(String, u16),

    #[error("STDIO error: {}", .0)]
    Stdio(#[from] std::io::Error),

    #[error("Command `{}` is registered more than once", .0)]
    DuplicateCommand(String),

    #[error("Unknown command: `{}`", .0)]
    UnknownCommand(String),

    #[error("Could not parse command: {}", .0)]
    Parse(#[from] crate::parser::ParseError),

    #[error("No command at index {}", .0)]
    CommandIndex(usize),

    #[error("GeoLayer `{}` does not exist", .0)]
    GeoLayerNotFound(String),

    #[error("GeoLayer `{}` already exists", .0)]
    GeoLayerExists(String),

    #[error("Table `{}` does not exist", .0)]
    TableNotFound(String),

    #[error("Table `{}` already exists", .0)]
    TableExists(String),

    #[error("Table `{}` has no column `{}`", .0, .1)]
    TableColumnNotFound(String, String),

    #[error("Property `{}` is not defined", .0)]
    PropertyNotFound(String),

    #[error("Property `{}` cannot be used as a list", .0)]
    PropertyNotList(String),

    #[error("Invalid parameter format, expected `Name=Value`: `{}`", .0)]
    ParameterFormat(String),

    #[error("Invalid line selection `{}`: {}", .0, .1)]
    InvalidSelection(String, String),

    #[error("Invalid ID: ID may not be empty")]
    EmptyId,

    #[error("Invalid ID `{}`: ID may not contain spaces", .0)]
    IdWithSpace(String),

    #[error("Invalid ID `{}`: ID may not contain a colon", .0)]
    IdWithColon(String),

    #[error("Invalid ID `{}`: ID cannot be purely numeric", .0)]
    NumericId(String),

    #[error("Run was cancelled")]
    Cancelled,

    #[error("Misc error: {}", .0)]
    Misc(String),
}

impl Error {
    pub fn io_error(file_description: &str, path: &str, original: std::io::Error) -> Self {
        Self::Io {
            file_description: file_description.to_string(),
            path: path.to_string(),
            original,
        }
    }

    pub fn yaml_error(
        action: &str,
        file_description: &str,
        path: &str,
        original: serde_yaml::Error,
    ) -> Self {
        Self::Yaml {
            action: action.to_string(),
            file_description: file_description.to_string(),
            path: path.to_string(),
            original,
        }
    }

    pub fn json_error(path: &str, original: serde_json::Error) -> Self {
        Self::Json {
            path: path.to_string(),
            original,
        }
    }

    pub fn csv_error(path: &str, original: csv::Error) -> Self {
        Self::Csv {
            path: path.to_string(),
            original,
        }
    }

    pub fn invalid_geojson(path: &str, reason: impl Into<String>) -> Self {
        Self::InvalidGeoJson {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}
