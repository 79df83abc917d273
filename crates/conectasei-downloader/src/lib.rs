pub mod downloader;
mod selection;

pub use downloader::{Downloader, DownloaderDeps};
