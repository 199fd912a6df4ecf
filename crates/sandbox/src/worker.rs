//! The thread that owns a script's QuickJS runtime.
//!
//! JS values are tied to their runtime and never leave this thread. The host
//! side only ever sees JSON and the request/reply channels.

use std::{
    collections::BTreeSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
    time::Instant,
};

use {
    pjman_progress::{DEFAULT_PLUGIN, ProgressBus},
    rquickjs::{
        CatchResultExt, CaughtError, Context, Ctx, Function, Object, Runtime, Value,
        function::{Func, Opt},
    },
    tokio::sync::{mpsc, oneshot},
    tracing::{debug, trace},
};

use crate::{
    capabilities::CapabilitySet,
    convert::{js_to_json, json_to_js},
    error::{Result, SandboxError},
    executor::SandboxOptions,
};

/// What the host learns about a script once it has been evaluated.
#[derive(Debug, Clone, Default)]
pub(crate) struct Exports {
    pub callable: BTreeSet<String>,
}

#[derive(Debug)]
pub(crate) struct Call {
    pub export: String,
    pub command: serde_json::Value,
    pub progress: ProgressBus,
    pub reply: oneshot::Sender<Result<serde_json::Value>>,
}

/// Start a worker for `source`. The returned receiver resolves once
/// evaluation finished; the sender then accepts calls until dropped.
pub(crate) fn spawn(
    source: String,
    capabilities: CapabilitySet,
    options: SandboxOptions,
) -> Result<(oneshot::Receiver<Result<Exports>>, mpsc::UnboundedSender<Call>)> {
    let (ready_tx, ready_rx) = oneshot::channel();
    let (calls_tx, calls_rx) = mpsc::unbounded_channel();
    std::thread::Builder::new()
        .name("pjman-script".into())
        .spawn(move || run(&source, &capabilities, &options, ready_tx, calls_rx))
        .map_err(|e| SandboxError::load_failed(format!("cannot start script worker: {e}")))?;
    Ok((ready_rx, calls_tx))
}

fn run(
    source: &str,
    capabilities: &CapabilitySet,
    options: &SandboxOptions,
    ready: oneshot::Sender<Result<Exports>>,
    mut calls: mpsc::UnboundedReceiver<Call>,
) {
    let runtime = match Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            let _ = ready.send(Err(SandboxError::load_failed(e.to_string())));
            return;
        },
    };

    let deadline: Arc<Mutex<Option<Instant>>> = Arc::new(Mutex::new(None));
    let timed_out = Arc::new(AtomicBool::new(false));
    {
        let deadline = Arc::clone(&deadline);
        let timed_out = Arc::clone(&timed_out);
        runtime.set_interrupt_handler(Some(Box::new(move || {
            let expired = deadline
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .is_some_and(|at| Instant::now() >= at);
            if expired {
                timed_out.store(true, Ordering::SeqCst);
            }
            expired
        })));
    }

    let context = match Context::full(&runtime) {
        Ok(context) => context,
        Err(e) => {
            let _ = ready.send(Err(SandboxError::load_failed(e.to_string())));
            return;
        },
    };

    context.with(|ctx| {
        if let Err(e) = capabilities.install(&ctx).catch(&ctx) {
            let _ = ready.send(Err(SandboxError::load_failed(describe(e, options.display_errors))));
            return;
        }

        // The shape check reads properties, so getters run under the same
        // deadline as the source.
        *deadline.lock().unwrap_or_else(|e| e.into_inner()) =
            options.timeout.map(|limit| Instant::now() + limit);
        let evaluated = ctx
            .eval::<Value, _>(source)
            .and_then(|value| {
                let described = describe_exports(&value)?;
                Ok((value, described))
            })
            .catch(&ctx);
        *deadline.lock().unwrap_or_else(|e| e.into_inner()) = None;

        let (exports, described) = match evaluated {
            Ok(loaded) => loaded,
            Err(caught) => {
                let err = match options.timeout {
                    Some(limit) if timed_out.load(Ordering::SeqCst) => {
                        SandboxError::Timeout { limit }
                    },
                    _ => SandboxError::load_failed(describe(caught, options.display_errors)),
                };
                let _ = ready.send(Err(err));
                return;
            },
        };

        if ready.send(Ok(described)).is_err() {
            return;
        }

        while let Some(call) = calls.blocking_recv() {
            trace!(export = %call.export, "script call");
            let outcome = invoke(&ctx, &exports, &call, options.display_errors);
            let _ = call.reply.send(outcome);
        }
        debug!("script released, worker exiting");
    });
}

fn describe_exports(value: &Value<'_>) -> rquickjs::Result<Exports> {
    let mut callable = BTreeSet::new();
    if let Some(object) = value.as_object().filter(|_| !value.is_function()) {
        for prop in object.props::<String, Value<'_>>() {
            let (name, item) = prop?;
            if item.is_function() {
                callable.insert(name);
            }
        }
    }
    Ok(Exports { callable })
}

/// Flatten a caught JS failure into one line of text, plus the stack when
/// `with_stack` is set.
fn describe(caught: CaughtError<'_>, with_stack: bool) -> String {
    match caught {
        CaughtError::Exception(exception) => {
            let name = exception
                .as_object()
                .get::<_, String>("name")
                .unwrap_or_else(|_| "Error".to_string());
            let mut text = match exception.message() {
                Some(message) if !message.is_empty() => format!("{name}: {message}"),
                _ => name,
            };
            if with_stack && let Some(stack) = exception.stack() {
                let stack = stack.trim_end();
                if !stack.is_empty() {
                    text.push('\n');
                    text.push_str(stack);
                }
            }
            text
        },
        CaughtError::Value(value) => crate::convert::display(&value),
        CaughtError::Error(rquickjs::Error::WouldBlock) => {
            "returned promise never settled".to_string()
        },
        CaughtError::Error(error) => error.to_string(),
    }
}

fn invoke<'js>(
    ctx: &Ctx<'js>,
    exports: &Value<'js>,
    call: &Call,
    display_errors: bool,
) -> Result<serde_json::Value> {
    let function = exports
        .as_object()
        .and_then(|object| object.get::<_, Value<'js>>(call.export.as_str()).ok())
        .and_then(|value| value.into_function())
        .ok_or_else(|| {
            SandboxError::call_failed(&call.export, format!("'{}' is not a function", call.export))
        })?;

    call_function(ctx, &function, call)
        .catch(ctx)
        .map(|value| js_to_json(&value))
        .map_err(|caught| SandboxError::call_failed(&call.export, describe(caught, display_errors)))
}

fn call_function<'js>(
    ctx: &Ctx<'js>,
    function: &Function<'js>,
    call: &Call,
) -> rquickjs::Result<Value<'js>> {
    let command = json_to_js(ctx, &call.command)?;
    let progress = progress_handle(ctx, &call.progress)?;
    let returned: Value<'js> = function.call((command, progress))?;
    match returned.as_promise() {
        Some(promise) => promise.finish::<Value<'js>>(),
        None => Ok(returned),
    }
}

/// The `progress` argument handed to `execute`/`undo`.
fn progress_handle<'js>(ctx: &Ctx<'js>, bus: &ProgressBus) -> rquickjs::Result<Object<'js>> {
    let handle = Object::new(ctx.clone())?;

    let start = bus.clone();
    handle.set(
        "start",
        Func::from(move |plugin: Opt<String>| {
            start.start(plugin.0.as_deref().unwrap_or(DEFAULT_PLUGIN));
        }),
    )?;

    let increment = bus.clone();
    handle.set(
        "increment",
        Func::from(
            move |message: Opt<String>, delta: Opt<f64>, plugin: Opt<String>| {
                increment.increment(
                    message.0.as_deref().unwrap_or_default(),
                    delta.0.map_or(1, |d| d.round() as i64),
                    plugin.0.as_deref().unwrap_or(DEFAULT_PLUGIN),
                );
            },
        ),
    )?;

    let complete = bus.clone();
    handle.set(
        "complete",
        Func::from(move |result: Opt<Value>| {
            complete.complete(result.0.as_ref().map(js_to_json).unwrap_or_default());
        }),
    )?;

    let error = bus.clone();
    handle.set(
        "error",
        Func::from(move |err: Opt<Value>| {
            error.error(err.0.as_ref().map(js_to_json).unwrap_or_default());
        }),
    )?;

    Ok(handle)
}
