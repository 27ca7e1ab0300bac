//! Handler registry keyed by message type.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::mem::size_of;
use std::sync::Arc;

use super::error::HandlerError;
use super::message::{Command, CommandHandler, Context, Event, EventHandler};

type CommandInvoker =
    Arc<dyn Fn(Box<dyn Any + Send>, &mut Context) -> Result<(), HandlerError> + Send + Sync>;
type EventInvoker =
    Arc<dyn Fn(&(dyn Any + Send), &mut Context) -> Result<(), HandlerError> + Send + Sync>;

/// Identity of a registered factory, used to make re-registration a no-op.
///
/// Only two cases can be proven identical: a zero-sized factory (a function
/// item or a closure capturing nothing) has exactly one value per type, and
/// a shared factory is the same allocation. Anything else is unique.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FactoryId {
    Stateless(TypeId),
    Shared(TypeId, usize),
    Unique,
}

impl FactoryId {
    fn of<F: 'static, H: 'static>() -> Self {
        if size_of::<F>() == 0 {
            FactoryId::Stateless(TypeId::of::<(F, H)>())
        } else {
            FactoryId::Unique
        }
    }

    fn shared<F: 'static, H: 'static>(factory: &Arc<F>) -> Self {
        // The registration keeps the Arc alive, so the address is not reused.
        FactoryId::Shared(TypeId::of::<(F, H)>(), Arc::as_ptr(factory) as usize)
    }

    fn matches(&self, other: &FactoryId) -> bool {
        *self != FactoryId::Unique && self == other
    }
}

/// A registered handler factory, erased to its invoker.
pub(crate) struct Registration<I> {
    factory: FactoryId,
    pub(crate) handler: &'static str,
    pub(crate) invoke: I,
}

pub(crate) struct Route<I> {
    pub(crate) message: &'static str,
    pub(crate) handlers: Vec<Registration<I>>,
}

impl<I> Route<I> {
    fn new(message: &'static str) -> Self {
        Self {
            message,
            handlers: Vec::new(),
        }
    }

    /// Returns false if the factory is already registered on this route.
    fn push(&mut self, registration: Registration<I>) -> bool {
        if self
            .handlers
            .iter()
            .any(|r| r.factory.matches(&registration.factory))
        {
            return false;
        }
        self.handlers.push(registration);
        true
    }
}

/// Command type → handler factories, event type → handler factories.
///
/// Commands may collect any number of factories here; the exactly-one rule
/// is enforced by `MessageBus::send`.
#[derive(Default)]
pub(crate) struct Registry {
    commands: HashMap<TypeId, Route<CommandInvoker>>,
    events: HashMap<TypeId, Route<EventInvoker>>,
}

impl Registry {
    pub(crate) fn add_command<C, F, H>(&mut self, factory: F) -> bool
    where
        C: Command,
        F: Fn() -> H + Send + Sync + 'static,
        H: CommandHandler<C> + 'static,
    {
        let id = FactoryId::of::<F, H>();
        self.insert_command::<C, F, H>(id, factory)
    }

    /// Register a factory by handle. Registering a clone of the same `Arc`
    /// again has no effect.
    pub(crate) fn add_shared_command<C, F, H>(&mut self, factory: Arc<F>) -> bool
    where
        C: Command,
        F: Fn() -> H + Send + Sync + 'static,
        H: CommandHandler<C> + 'static,
    {
        let id = FactoryId::shared::<F, H>(&factory);
        self.insert_command::<C, _, H>(id, move || (*factory)())
    }

    pub(crate) fn add_event<E, F, H>(&mut self, factory: F) -> bool
    where
        E: Event,
        F: Fn() -> H + Send + Sync + 'static,
        H: EventHandler<E> + 'static,
    {
        let id = FactoryId::of::<F, H>();
        self.insert_event::<E, F, H>(id, factory)
    }

    pub(crate) fn add_shared_event<E, F, H>(&mut self, factory: Arc<F>) -> bool
    where
        E: Event,
        F: Fn() -> H + Send + Sync + 'static,
        H: EventHandler<E> + 'static,
    {
        let id = FactoryId::shared::<F, H>(&factory);
        self.insert_event::<E, _, H>(id, move || (*factory)())
    }

    fn insert_command<C, F, H>(&mut self, id: FactoryId, factory: F) -> bool
    where
        C: Command,
        F: Fn() -> H + Send + Sync + 'static,
        H: CommandHandler<C> + 'static,
    {
        let invoke: CommandInvoker =
            Arc::new(move |command: Box<dyn Any + Send>, ctx: &mut Context| {
                let command = command.downcast::<C>().map_err(|_| mismatch(C::NAME))?;
                factory().handle(*command, ctx)
            });

        self.commands
            .entry(TypeId::of::<C>())
            .or_insert_with(|| Route::new(C::NAME))
            .push(Registration {
                factory: id,
                handler: type_name::<H>(),
                invoke,
            })
    }

    fn insert_event<E, F, H>(&mut self, id: FactoryId, factory: F) -> bool
    where
        E: Event,
        F: Fn() -> H + Send + Sync + 'static,
        H: EventHandler<E> + 'static,
    {
        let invoke: EventInvoker =
            Arc::new(move |event: &(dyn Any + Send), ctx: &mut Context| {
                let event = event.downcast_ref::<E>().ok_or_else(|| mismatch(E::NAME))?;
                factory().handle(event, ctx)
            });

        self.events
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Route::new(E::NAME))
            .push(Registration {
                factory: id,
                handler: type_name::<H>(),
                invoke,
            })
    }

    /// Every factory registered for a command type, possibly none.
    pub(crate) fn command_handlers(&self, command: TypeId) -> &[Registration<CommandInvoker>] {
        self.commands
            .get(&command)
            .map(|route| route.handlers.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn event_handlers(&self, event: TypeId) -> &[Registration<EventInvoker>] {
        self.events
            .get(&event)
            .map(|route| route.handlers.as_slice())
            .unwrap_or(&[])
    }

    pub(crate) fn command_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.commands.values().map(|r| r.message).collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn event_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.events.values().map(|r| r.message).collect();
        names.sort_unstable();
        names
    }
}

fn mismatch(message: &'static str) -> HandlerError {
    HandlerError::other(format!("payload type does not match route for {}", message))
}
