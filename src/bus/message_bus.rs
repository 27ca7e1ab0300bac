//! MessageBus - routes commands to one handler and events to many.

use std::any::TypeId;
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use super::error::HandlerError;
use super::message::{Command, CommandHandler, Context, Event, EventHandler, RaisedEvent};
use super::registry::Registry;
use super::sink::{ErrorSink, ListenerFailure, PublishReport, TracingErrorSink};

/// Builder for a [`MessageBus`]. All registration happens here; the bus it
/// builds is immutable.
///
/// ```ignore
/// let uow: SharedUnitOfWorkManager = Arc::new(store.clone());
/// let bus = MessageBus::builder()
///     .command::<CreateProduct, _, _>({
///         let uow = uow.clone();
///         move || CreateProductHandler::new(uow.clone())
///     })
///     .event::<ProductCreated, _, _>(|| AuditLog)
///     .build();
/// ```
pub struct MessageBusBuilder {
    registry: Registry,
    sink: Arc<dyn ErrorSink>,
    max_cascade_depth: usize,
}

/// How many generations of follow-up events one publish may produce.
pub const DEFAULT_MAX_CASCADE_DEPTH: usize = 16;

impl Default for MessageBusBuilder {
    fn default() -> Self {
        Self {
            registry: Registry::default(),
            sink: Arc::new(TracingErrorSink),
            max_cascade_depth: DEFAULT_MAX_CASCADE_DEPTH,
        }
    }
}

impl MessageBusBuilder {
    /// Register a handler factory for command type `C`.
    ///
    /// Registering the same function item or non-capturing closure twice has
    /// no further effect. A capturing closure or a function pointer is a new
    /// factory every time; use [`command_shared`](Self::command_shared) to
    /// re-register one by handle. Registering a second, different factory is
    /// allowed here; `send` rejects the ambiguity at dispatch time.
    pub fn command<C, F, H>(mut self, factory: F) -> Self
    where
        C: Command,
        F: Fn() -> H + Send + Sync + 'static,
        H: CommandHandler<C> + 'static,
    {
        if !self.registry.add_command::<C, F, H>(factory) {
            tracing::debug!(command = C::NAME, "handler factory already registered");
        }
        self
    }

    /// Register a shared command handler factory. Registering the same `Arc`
    /// (or a clone of it) again has no further effect.
    pub fn command_shared<C, F, H>(mut self, factory: Arc<F>) -> Self
    where
        C: Command,
        F: Fn() -> H + Send + Sync + 'static,
        H: CommandHandler<C> + 'static,
    {
        if !self.registry.add_shared_command::<C, F, H>(factory) {
            tracing::debug!(command = C::NAME, "handler factory already registered");
        }
        self
    }

    /// Register a handler factory for event type `E`. Any number of distinct
    /// factories may listen to the same event; they run in registration order.
    /// Identity follows the same rules as [`command`](Self::command).
    pub fn event<E, F, H>(mut self, factory: F) -> Self
    where
        E: Event,
        F: Fn() -> H + Send + Sync + 'static,
        H: EventHandler<E> + 'static,
    {
        if !self.registry.add_event::<E, F, H>(factory) {
            tracing::debug!(event = E::NAME, "handler factory already registered");
        }
        self
    }

    pub fn event_shared<E, F, H>(mut self, factory: Arc<F>) -> Self
    where
        E: Event,
        F: Fn() -> H + Send + Sync + 'static,
        H: EventHandler<E> + 'static,
    {
        if !self.registry.add_shared_event::<E, F, H>(factory) {
            tracing::debug!(event = E::NAME, "handler factory already registered");
        }
        self
    }

    /// Limit on nested follow-up events. An event published directly is at
    /// depth 0; events raised by its listeners are at depth 1, and so on.
    /// Events that would exceed the limit are dropped and reported as
    /// [`HandlerError::CascadeLimit`] failures.
    pub fn max_cascade_depth(mut self, depth: usize) -> Self {
        self.max_cascade_depth = depth;
        self
    }

    /// Where event handler failures are reported. Defaults to [`TracingErrorSink`].
    pub fn error_sink<S: ErrorSink + 'static>(mut self, sink: S) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    pub fn build(self) -> MessageBus {
        MessageBus {
            inner: Arc::new(Inner {
                registry: self.registry,
                sink: self.sink,
                max_cascade_depth: self.max_cascade_depth,
            }),
        }
    }
}

struct Inner {
    registry: Registry,
    sink: Arc<dyn ErrorSink>,
    max_cascade_depth: usize,
}

/// In-process command/event router.
///
/// Cheap to clone and safe to share across threads: the registry is frozen
/// when the bus is built, so dispatch takes no locks.
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<Inner>,
}

impl MessageBus {
    pub fn builder() -> MessageBusBuilder {
        MessageBusBuilder::default()
    }

    /// Dispatch a command to its single registered handler.
    ///
    /// Fails with [`HandlerError::Resolution`] when zero or several handlers
    /// are registered for `C`, without invoking any of them. Otherwise a fresh
    /// handler is built and run synchronously; its error, if any, is returned
    /// as is. Events the handler raised are published after it succeeds;
    /// handlers raise them only once their unit of work has committed (see
    /// [`Context::raise_committed`]).
    pub fn send<C: Command>(&self, command: C) -> Result<(), HandlerError> {
        let span = tracing::debug_span!("send", command = C::NAME);
        let _enter = span.enter();

        let handlers = self.inner.registry.command_handlers(TypeId::of::<C>());
        let [registration] = handlers else {
            tracing::debug!(registered = handlers.len(), "command handler resolution failed");
            return Err(HandlerError::Resolution {
                command: C::NAME,
                registered: handlers.len(),
            });
        };

        let mut ctx = Context::new(C::NAME);
        (registration.invoke)(Box::new(command), &mut ctx)?;
        tracing::debug!(handler = registration.handler, "command handled");

        let raised = ctx.take_raised();
        if !raised.is_empty() {
            let report = self.dispatch(raised);
            tracing::debug!(
                delivered = report.delivered,
                failed = report.failures.len(),
                "raised events published"
            );
        }
        Ok(())
    }

    /// Deliver an event to every registered handler, in registration order.
    ///
    /// Having no handlers is not an error. Each handler runs independently:
    /// a failure is sent to the error sink, recorded in the returned report,
    /// and does not stop the remaining handlers. Events raised by handlers
    /// are delivered after the current one, breadth first, up to the
    /// configured cascade depth.
    pub fn publish<E: Event>(&self, event: E) -> PublishReport {
        let span = tracing::debug_span!("publish", event = E::NAME);
        let _enter = span.enter();
        self.dispatch(vec![RaisedEvent::new(event)])
    }

    fn dispatch(&self, events: Vec<RaisedEvent>) -> PublishReport {
        let mut queue: VecDeque<(RaisedEvent, usize)> =
            events.into_iter().map(|event| (event, 0)).collect();
        let mut report = PublishReport::default();

        while let Some((event, depth)) = queue.pop_front() {
            let handlers = self.inner.registry.event_handlers(event.type_id);
            if handlers.is_empty() {
                tracing::trace!(event = event.name, "no event handlers registered");
                continue;
            }

            for registration in handlers {
                let mut ctx = Context::new(event.name);
                let error = match (registration.invoke)(event.payload.as_ref(), &mut ctx) {
                    Ok(()) => {
                        report.delivered += 1;
                        let raised = ctx.take_raised();
                        if raised.is_empty() {
                            continue;
                        }
                        if depth < self.inner.max_cascade_depth {
                            queue.extend(raised.into_iter().map(|next| (next, depth + 1)));
                            continue;
                        }
                        HandlerError::CascadeLimit {
                            event: raised[0].name,
                            depth: depth + 1,
                        }
                    }
                    Err(error) => error,
                };

                let failure = ListenerFailure {
                    event: event.name,
                    handler: registration.handler,
                    error,
                };
                self.inner.sink.report(&failure);
                report.failures.push(failure);
            }
        }

        report
    }

    /// Names of all command types with at least one registered handler.
    pub fn commands(&self) -> Vec<&'static str> {
        self.inner.registry.command_names()
    }

    /// Names of all event types with at least one registered handler.
    pub fn events(&self) -> Vec<&'static str> {
        self.inner.registry.event_names()
    }

    pub fn command_handler_count<C: Command>(&self) -> usize {
        self.inner.registry.command_handlers(TypeId::of::<C>()).len()
    }

    pub fn event_handler_count<E: Event>(&self) -> usize {
        self.inner.registry.event_handlers(TypeId::of::<E>()).len()
    }
}

impl fmt::Debug for MessageBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBus")
            .field("commands", &self.commands())
            .field("events", &self.events())
            .finish()
    }
}
