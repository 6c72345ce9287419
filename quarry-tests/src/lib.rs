mod batches;
mod conflicts;
mod library;
mod pool;
mod queries;
mod schema;
mod simple;
#[cfg(not(feature = "disable-savepoints"))]
mod transactions;
mod versions;

use crate::{
    batches::batches, conflicts::conflicts, library::library, queries::queries, simple::simple,
    versions::versions,
};
use log::LevelFilter;
use quarry::Connection;
use std::env;

pub use pool::pool;
pub use schema::*;
#[cfg(not(feature = "disable-savepoints"))]
use transactions::transactions;

pub fn init_logs() {
    let mut logger = env_logger::builder();
    logger
        .is_test(true)
        .format_file(true)
        .format_line_number(true);
    if env::var("RUST_LOG").is_err() {
        logger.filter_level(LevelFilter::Warn);
    }
    let _ = logger.try_init();
}

pub async fn execute_tests<C: Connection>(mut connection: C) {
    simple(&mut connection).await;
    versions(&mut connection).await;
    conflicts(&mut connection).await;
    library(&mut connection).await;
    batches(&mut connection).await;
    queries(&mut connection).await;
    #[cfg(not(feature = "disable-savepoints"))]
    transactions(&mut connection).await;
}

#[macro_export]
macro_rules! silent_logs {
    ($($code:tt)+) => {{
        let level = log::max_level();
        log::set_max_level(log::LevelFilter::Off);
        $($code)+
        log::set_max_level(level);
    }};
}
