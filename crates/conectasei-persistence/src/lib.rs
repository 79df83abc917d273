pub mod document_history;
pub mod download_tasks;
pub mod extraction_tasks;
pub mod pool;
pub mod processes;
pub mod schedules;
mod status;
pub mod system_config;
pub mod tenants;
pub mod transaction;

pub use document_history::DocumentHistoryRepository;
pub use download_tasks::DownloadTaskRepository;
pub use extraction_tasks::{AdmissionOutcome, ExtractionTaskRepository};
pub use pool::connect;
pub use processes::ProcessRepository;
pub use schedules::ScheduleRepository;
pub use system_config::SystemConfigRepository;
pub use tenants::TenantRepository;
