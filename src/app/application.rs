//! The application the engine dispatches into.
//!
//! # Responsibilities
//! - Own the route resolver, executor, error handler and finalizers
//! - Run startup and shutdown hooks in registration order
//! - Carry the production flag and the codec set copied into each response
//!
//! # Design Decisions
//! - The resolver lives in an `ArcSwap` so routes can be replaced live;
//!   replacements only take effect for uncached resolutions
//! - Production mode is a single atomic flag flipped by the driver at start

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use futures_util::future::BoxFuture;

use crate::app::error_handler::{DefaultErrorHandler, ErrorHandler};
use crate::app::hooks::{Finalizer, Hook};
use crate::config::{EncodingConfig, EngineConfig};
use crate::dispatch::encoding::{builtin_codec, CodecError, ContentCodec};
use crate::http::{BoxError, CodecMap, RequestContext, ResponseContext};
use crate::observability::Logger;
use crate::pipeline::{DefaultExecutor, HandlerExecutor};
use crate::routing::{RouteResolver, RouteTable};

/// Shared resolver slot.
pub type SharedResolver = Arc<Box<dyn RouteResolver>>;

pub struct Application {
    resolver: ArcSwap<Box<dyn RouteResolver>>,
    executor: Arc<dyn HandlerExecutor>,
    error_handler: Arc<dyn ErrorHandler>,
    finalizers: Vec<Finalizer>,
    startup_hooks: Vec<Hook>,
    shutdown_hooks: Vec<Hook>,
    logger: Option<Logger>,
    codecs: CodecMap,
    production: AtomicBool,
}

impl Application {
    pub fn builder() -> ApplicationBuilder {
        ApplicationBuilder::new()
    }

    /// Current resolver. Callers hold the returned `Arc` for one resolution.
    pub fn resolver(&self) -> SharedResolver {
        self.resolver.load_full()
    }

    /// Swap in a new resolver.
    pub fn replace_resolver(&self, resolver: impl RouteResolver + 'static) {
        self.resolver.store(Arc::new(Box::new(resolver)));
        tracing::info!(production = self.is_production(), "Route resolver replaced");
    }

    pub fn executor(&self) -> &dyn HandlerExecutor {
        self.executor.as_ref()
    }

    pub fn error_handler(&self) -> &dyn ErrorHandler {
        self.error_handler.as_ref()
    }

    pub fn finalizers(&self) -> &[Finalizer] {
        &self.finalizers
    }

    pub fn logger(&self) -> Option<&Logger> {
        self.logger.as_ref()
    }

    pub fn codecs(&self) -> &CodecMap {
        &self.codecs
    }

    pub fn is_production(&self) -> bool {
        self.production.load(Ordering::Acquire)
    }

    pub fn set_production(&self, production: bool) {
        self.production.store(production, Ordering::Release);
    }

    /// Fresh response context carrying a copy of the registered codecs.
    pub fn new_response_context(&self) -> ResponseContext {
        ResponseContext::new(self.codecs.clone())
    }

    /// Run startup hooks in order, stopping at the first failure.
    pub async fn run_startup_hooks(&self) -> Result<(), BoxError> {
        for (index, hook) in self.startup_hooks.iter().enumerate() {
            hook(self).await.map_err(|e| {
                tracing::error!(hook = index, error = %e, "Startup hook failed");
                e
            })?;
        }
        tracing::debug!(hooks = self.startup_hooks.len(), "Startup hooks complete");
        Ok(())
    }

    /// Run shutdown hooks in order. Failures are logged and do not stop later hooks.
    pub async fn close(&self) {
        for (index, hook) in self.shutdown_hooks.iter().enumerate() {
            if let Err(e) = hook(self).await {
                tracing::error!(hook = index, error = %e, "Shutdown hook failed");
            }
        }
        tracing::debug!(hooks = self.shutdown_hooks.len(), "Application closed");
    }
}

impl std::fmt::Debug for Application {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Application")
            .field("finalizers", &self.finalizers.len())
            .field("startup_hooks", &self.startup_hooks.len())
            .field("shutdown_hooks", &self.shutdown_hooks.len())
            .field("logger", &self.logger)
            .field("codecs", &self.codecs.keys().collect::<Vec<_>>())
            .field("production", &self.is_production())
            .finish()
    }
}

/// Build the ordered codec set named in configuration.
pub fn codecs_from_config(config: &EncodingConfig) -> Result<CodecMap, CodecError> {
    config
        .codecs
        .iter()
        .map(|name| Ok((name.clone(), builtin_codec(name, config.level)?)))
        .collect()
}

/// Builder for [`Application`].
pub struct ApplicationBuilder {
    resolver: Box<dyn RouteResolver>,
    executor: Arc<dyn HandlerExecutor>,
    error_handler: Arc<dyn ErrorHandler>,
    finalizers: Vec<Finalizer>,
    startup_hooks: Vec<Hook>,
    shutdown_hooks: Vec<Hook>,
    logger: Option<Logger>,
    codecs: CodecMap,
}

impl ApplicationBuilder {
    /// Empty route table, default executor and error handler, no codecs.
    pub fn new() -> Self {
        Self {
            resolver: Box::new(RouteTable::new()),
            executor: Arc::new(DefaultExecutor),
            error_handler: Arc::new(DefaultErrorHandler),
            finalizers: Vec::new(),
            startup_hooks: Vec::new(),
            shutdown_hooks: Vec::new(),
            logger: None,
            codecs: CodecMap::new(),
        }
    }

    /// Apply the encoding and logger settings from `config`.
    pub fn configure(mut self, config: &EngineConfig) -> Result<Self, CodecError> {
        self.codecs = codecs_from_config(&config.encoding)?;
        self.logger = config
            .observability
            .app_logger
            .then(|| Logger::new(env!("CARGO_PKG_NAME")));
        Ok(self)
    }

    pub fn resolver(mut self, resolver: impl RouteResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    pub fn executor(mut self, executor: impl HandlerExecutor + 'static) -> Self {
        self.executor = Arc::new(executor);
        self
    }

    pub fn error_handler(mut self, handler: impl ErrorHandler + 'static) -> Self {
        self.error_handler = Arc::new(handler);
        self
    }

    pub fn finalizer<F>(mut self, finalizer: F) -> Self
    where
        F: for<'a> Fn(&'a mut RequestContext, &'a mut ResponseContext) -> BoxFuture<'a, Result<(), BoxError>>
            + Send
            + Sync
            + 'static,
    {
        self.finalizers.push(Arc::new(finalizer));
        self
    }

    pub fn on_startup<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a Application) -> BoxFuture<'a, Result<(), BoxError>> + Send + Sync + 'static,
    {
        self.startup_hooks.push(Arc::new(hook));
        self
    }

    pub fn on_shutdown<F>(mut self, hook: F) -> Self
    where
        F: for<'a> Fn(&'a Application) -> BoxFuture<'a, Result<(), BoxError>> + Send + Sync + 'static,
    {
        self.shutdown_hooks.push(Arc::new(hook));
        self
    }

    pub fn logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn without_logger(mut self) -> Self {
        self.logger = None;
        self
    }

    /// Register a codec. Registration order decides what `*` selects.
    pub fn codec(mut self, name: impl Into<String>, codec: Arc<dyn ContentCodec>) -> Self {
        self.codecs.insert(name.into(), codec);
        self
    }

    pub fn build(self) -> Application {
        Application {
            resolver: ArcSwap::from_pointee(self.resolver),
            executor: self.executor,
            error_handler: self.error_handler,
            finalizers: self.finalizers,
            startup_hooks: self.startup_hooks,
            shutdown_hooks: self.shutdown_hooks,
            logger: self.logger,
            codecs: self.codecs,
            production: AtomicBool::new(false),
        }
    }
}

impl Default for ApplicationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::encoding::CompressionLevel;
    use std::sync::Mutex;

    #[tokio::test]
    async fn startup_stops_at_first_failure() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&log), Arc::clone(&log));
        let app = Application::builder()
            .on_startup(move |_app| {
                let log = Arc::clone(&a);
                Box::pin(async move {
                    log.lock().unwrap().push("first");
                    Err("database unreachable".into())
                })
            })
            .on_startup(move |_app| {
                let log = Arc::clone(&b);
                Box::pin(async move {
                    log.lock().unwrap().push("second");
                    Ok(())
                })
            })
            .build();

        let err = app.run_startup_hooks().await.unwrap_err();
        assert_eq!(err.to_string(), "database unreachable");
        assert_eq!(*log.lock().unwrap(), vec!["first"]);
    }

    #[tokio::test]
    async fn shutdown_runs_every_hook() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let (a, b) = (Arc::clone(&log), Arc::clone(&log));
        let app = Application::builder()
            .on_shutdown(move |_app| {
                let log = Arc::clone(&a);
                Box::pin(async move {
                    log.lock().unwrap().push("flush");
                    Err("flush failed".into())
                })
            })
            .on_shutdown(move |_app| {
                let log = Arc::clone(&b);
                Box::pin(async move {
                    log.lock().unwrap().push("disconnect");
                    Ok(())
                })
            })
            .build();

        app.close().await;
        assert_eq!(*log.lock().unwrap(), vec!["flush", "disconnect"]);
    }

    #[test]
    fn codecs_keep_configured_order() {
        let config = EncodingConfig {
            codecs: vec!["br".into(), "gzip".into()],
            level: CompressionLevel::Fast,
        };
        let codecs = codecs_from_config(&config).unwrap();
        assert_eq!(codecs.keys().collect::<Vec<_>>(), vec!["br", "gzip"]);
    }

    #[test]
    fn production_flag_toggles() {
        let app = Application::builder().build();
        assert!(!app.is_production());
        app.set_production(true);
        assert!(app.is_production());
    }
}
