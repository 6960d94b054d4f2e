use thiserror::Error;

pub type Result<T> = std::result::Result<T, FlightmapError>;

#[derive(Error, Debug)]
pub enum FlightmapError {
    #[error("HTTP error {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error {0}")]
    Csv(#[from] csv::Error),

    #[error("config error {0}")]
    Config(#[from] toml::de::Error),

    #[error("SVG error {0}")]
    Svg(#[from] usvg::Error),

    #[error("render error {0}")]
    Render(String),

    #[error("parse error {0}")]
    Parse(String),
}
