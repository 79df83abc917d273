pub mod family_v4;
pub mod plugin;
pub mod plugin_4_2_0;
pub mod registry;
pub mod selectors;

pub use plugin::{DiscoveredDocument, DiscoveredProcess, DownloadedFile, PageAccessType, ScraperPlugin};
pub use registry::ScraperRegistry;
