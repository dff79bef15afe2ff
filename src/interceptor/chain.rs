// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Driver-facing hooks and the process-wide interception chain.
//!
//! A driver calls the `*_executing` hook of every registered interceptor before it
//! runs a command, and the matching `*_executed` hook afterwards, on success and on
//! failure alike. Interceptors only observe: the driver returns its own result to
//! its caller regardless of what the hooks do.

use std::path::Path;
use std::sync::{Arc, RwLock};

use once_cell::sync::{Lazy, OnceCell};

use crate::config::{self, InterceptorConfig};
use crate::types::{Command, DbFailure, DbValue};

use super::sink::{LogSink, MetricSink};
use super::tracker::MetricInterceptor;

/// Hooks invoked by a driver around each command.
///
/// All methods default to no-ops so an interceptor only implements what it needs.
#[allow(unused_variables)]
pub trait CommandInterceptor: Send + Sync {
    /// Before a statement that returns an affected-row count.
    fn non_query_executing(&self, command: &Command) {}

    /// After a non-query completes.
    fn non_query_executed(&self, command: &Command, result: Result<usize, &DbFailure>) {}

    /// Before a statement whose rows are read.
    fn reader_executing(&self, command: &Command) {}

    /// After a reader completes.
    fn reader_executed(&self, command: &Command, result: Result<(), &DbFailure>) {}

    /// Before a statement returning a single value.
    fn scalar_executing(&self, command: &Command) {}

    /// After a scalar completes.
    fn scalar_executed(&self, command: &Command, result: Result<&DbValue, &DbFailure>) {}
}

impl CommandInterceptor for MetricInterceptor {
    fn non_query_executing(&self, command: &Command) {
        self.start_tracking(command);
    }

    fn non_query_executed(&self, command: &Command, result: Result<usize, &DbFailure>) {
        let count = result.as_ref().ok().map(|n| i64::try_from(*n).unwrap_or(i64::MAX));
        self.stop_tracking(command, count, result.err());
    }

    fn reader_executing(&self, command: &Command) {
        self.start_tracking(command);
    }

    fn reader_executed(&self, command: &Command, result: Result<(), &DbFailure>) {
        self.stop_tracking(command, None, result.err());
    }

    fn scalar_executing(&self, command: &Command) {
        self.start_tracking(command);
    }

    fn scalar_executed(&self, command: &Command, result: Result<&DbValue, &DbFailure>) {
        self.stop_tracking(command, None, result.err());
    }
}

static CHAIN: Lazy<RwLock<Vec<Arc<dyn CommandInterceptor>>>> = Lazy::new(|| RwLock::new(Vec::new()));

static INSTALLED: OnceCell<Option<Arc<MetricInterceptor>>> = OnceCell::new();

/// Add an interceptor to the process-wide chain.
pub fn add_interceptor(interceptor: Arc<dyn CommandInterceptor>) {
    CHAIN
        .write()
        .unwrap_or_else(|e| e.into_inner())
        .push(interceptor);
}

/// Snapshot of the registered interceptors, in registration order.
pub fn interceptors() -> Vec<Arc<dyn CommandInterceptor>> {
    CHAIN.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// Install the metric interceptor using configuration from the current directory.
///
/// Safe to call any number of times from any thread; only the first call installs.
pub fn install() {
    let root = std::env::current_dir().unwrap_or_else(|_| Path::new(".").to_path_buf());
    install_with(|| MetricInterceptor::new(config::safe_load(&root)));
}

/// Install a metric interceptor with explicit configuration and sinks.
///
/// Ignored when an interceptor has already been installed.
pub fn install_with_sinks(
    config: InterceptorConfig,
    log_sink: Arc<dyn LogSink>,
    metric_sink: Arc<dyn MetricSink>,
) {
    install_with(|| MetricInterceptor::with_sinks(config, log_sink, metric_sink));
}

fn install_with(build: impl FnOnce() -> MetricInterceptor) {
    INSTALLED.get_or_init(|| {
        let interceptor = build();
        if !interceptor.config().enabled {
            tracing::info!("Database instrumentation disabled by configuration");
            return None;
        }
        let interceptor = Arc::new(interceptor);
        add_interceptor(interceptor.clone());
        tracing::debug!("Database instrumentation installed");
        Some(interceptor)
    });
}

/// The installed metric interceptor, if installation ran and was enabled.
pub fn installed() -> Option<Arc<MetricInterceptor>> {
    INSTALLED.get().and_then(|slot| slot.clone())
}

/// Whether installation has run (enabled or not).
pub fn is_installed() -> bool {
    INSTALLED.get().is_some()
}
