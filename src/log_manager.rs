//! Stub recovery-log hook. The storage core calls into a `LogManager` at
//! well-defined points (table page mutation, B+ tree page mutation) but
//! does not implement WAL/recovery itself — that lives in an external
//! collaborator, the same way `small-db::tx_log::LogManager` is injected
//! into the buffer pool rather than owned by it.

use crate::types::PageId;

/// Recovery-log hook injected into the table heap and B+ tree. The default
/// `NoOpLogManager` satisfies every call site with an empty record; a real
/// ARIES-style implementation lives outside this crate.
pub trait LogManager {
    fn log_insert(&mut self, _page_id: PageId) {}
    fn log_update(&mut self, _page_id: PageId) {}
    fn log_delete(&mut self, _page_id: PageId) {}
    fn log_commit(&mut self) {}
    fn log_abort(&mut self) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoOpLogManager;

impl LogManager for NoOpLogManager {}

pub fn init_env_logger() {
    use env_logger::Builder;
    use std::io::Write;
    use std::sync::Once;

    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let mut builder = Builder::from_default_env();
        builder
            .format_timestamp_micros()
            .format(|buf, record| {
                writeln!(
                    buf,
                    "[{} {}] {}",
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .init();
    });
}
