//! Named, Typed Publish/Subscribe Dispatch
//!
//! This module provides the registry that decouples the input, update and
//! render phases of a frame. Producers publish to a named channel; every
//! subscriber bound to that name is called synchronously, in subscription
//! order, on the publishing thread.
//!
//! # Design Principles
//!
//! - **Type Safety**: Each channel carries one argument type, fixed when the
//!   channel is created. Well-known channels are `EventKey` constants, so a
//!   mismatched publish does not compile.
//! - **Explicit Ownership**: The registry is a cheap-to-clone handle that is
//!   passed to whoever needs it. It is `!Send`: one thread owns it.
//! - **Safe Teardown**: Bound objects are held weakly. A subscriber that is
//!   dropped without unsubscribing is skipped and pruned, never dereferenced.
//!
//! # Example
//!
//! ```ignore
//! let registry = EventRegistry::new();
//! let token = SubscriberId::token();
//!
//! registry.subscribe(events::UPDATE, token, |dt: &f32| log::trace!("tick {dt}"));
//! registry.invoke(events::UPDATE, &0.016)?;
//! registry.unsubscribe(events::UPDATE, token);
//! ```

use std::any::{Any, type_name};
use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::input::InputSnapshot;

// ============================================================================
// Channel Vocabulary
// ============================================================================

/// Per-frame input snapshot, published by the `InputManager`.
pub const INPUT: EventKey<InputSnapshot> = EventKey::new("input");
/// Per-frame logic tick; the payload is the frame delta in seconds.
pub const UPDATE: EventKey<f32> = EventKey::new("update");
/// 3D scene pass.
pub const RENDER_3D: EventKey<()> = EventKey::new("render3D");
/// 2D overlay pass, always after `RENDER_3D`.
pub const RENDER_2D: EventKey<()> = EventKey::new("render2D");
/// Immediate-mode debug UI pass, last in the frame.
pub const DEBUG_UI: EventKey<()> = EventKey::new("imgui");
/// Framebuffer size changed.
pub const ON_WINDOW_RESIZE: EventKey<WindowSize> = EventKey::new("onWindowResize");

/// New framebuffer dimensions carried by `ON_WINDOW_RESIZE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowSize {
    /// Width in physical pixels
    pub width: u32,
    /// Height in physical pixels
    pub height: u32,
}

impl WindowSize {
    /// Create a new window size
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width divided by height, guarding against a zero height
    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

// ============================================================================
// Keys and Identities
// ============================================================================

/// A channel name bound at compile time to its argument type.
pub struct EventKey<A> {
    name: &'static str,
    _args: PhantomData<fn(&A)>,
}

impl<A> EventKey<A> {
    /// Declare a typed channel name.
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _args: PhantomData,
        }
    }

    /// The channel's string name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }
}

impl<A> Clone for EventKey<A> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<A> Copy for EventKey<A> {}

impl<A> fmt::Debug for EventKey<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventKey")
            .field("name", &self.name)
            .field("args", &type_name::<A>())
            .finish()
    }
}

/// Anything that names a channel.
pub trait ChannelName {
    /// The channel's string name.
    fn channel_name(&self) -> &str;
}

/// A channel name usable with argument type `A`.
///
/// Plain strings accept any `A` and are checked when the channel is looked
/// up. `EventKey<A>` only accepts its own `A`.
pub trait ChannelKey<A>: ChannelName {}

impl ChannelName for &str {
    fn channel_name(&self) -> &str {
        self
    }
}

impl ChannelName for String {
    fn channel_name(&self) -> &str {
        self
    }
}

impl<A> ChannelName for EventKey<A> {
    fn channel_name(&self) -> &str {
        self.name
    }
}

impl<A> ChannelKey<A> for &str {}
impl<A> ChannelKey<A> for String {}
impl<A> ChannelKey<A> for EventKey<A> {}

/// Global counter for caller-supplied subscriber tokens
static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

/// Identifies who registered a binding, so it can be removed later.
///
/// The registry compares identities but never dereferences them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(Identity);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Identity {
    /// Address of a shared object's allocation
    Object(usize),
    /// Free-standing token
    Token(u64),
}

impl SubscriberId {
    /// Identity of a shared object.
    ///
    /// Stable for as long as `object` is alive.
    #[must_use]
    pub fn of<T: ?Sized>(object: &Rc<T>) -> Self {
        Self(Identity::Object(Rc::as_ptr(object).cast::<()>() as usize))
    }

    /// A fresh, process-unique token for free-function subscribers.
    #[must_use]
    pub fn token() -> Self {
        Self(Identity::Token(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed)))
    }
}

// ============================================================================
// Errors and Handler Results
// ============================================================================

/// Error type a handler may return.
pub type HandlerError = Box<dyn std::error::Error>;

/// Return types accepted from handlers: `()` or `Result<(), E>`.
pub trait HandlerOutput {
    /// Normalize into a result.
    fn into_result(self) -> Result<(), HandlerError>;
}

impl HandlerOutput for () {
    fn into_result(self) -> Result<(), HandlerError> {
        Ok(())
    }
}

impl<E: Into<HandlerError>> HandlerOutput for Result<(), E> {
    fn into_result(self) -> Result<(), HandlerError> {
        self.map_err(Into::into)
    }
}

/// What to do when a handler fails mid-dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DispatchPolicy {
    /// Stop at the first failure and return it
    #[default]
    FailFast,
    /// Log each failure and keep calling the remaining handlers
    Isolate,
}

/// Errors surfaced by `invoke`.
#[derive(Debug)]
pub enum EventError {
    /// A handler returned an error
    Handler {
        /// Channel being dispatched
        channel: String,
        /// Binding that failed
        subscriber: SubscriberId,
        /// The handler's error
        source: HandlerError,
    },
    /// A bound object was already borrowed (re-entrant dispatch into it)
    SubscriberBusy {
        /// Channel being dispatched
        channel: String,
        /// Binding that could not be called
        subscriber: SubscriberId,
    },
}

impl fmt::Display for EventError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Handler {
                channel,
                subscriber,
                source,
            } => write!(f, "handler {subscriber:?} on '{channel}' failed: {source}"),
            Self::SubscriberBusy {
                channel,
                subscriber,
            } => write!(
                f,
                "subscriber {subscriber:?} on '{channel}' is already borrowed"
            ),
        }
    }
}

impl std::error::Error for EventError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Handler { source, .. } => Some(source.as_ref()),
            Self::SubscriberBusy { .. } => None,
        }
    }
}

// ============================================================================
// Event Channel
// ============================================================================

/// Result of calling one binding
enum Outcome {
    Delivered,
    Failed(HandlerError),
    Busy,
    /// The bound object no longer exists
    Orphaned,
}

type Handler<A> = Rc<dyn Fn(&A) -> Outcome>;

struct Binding<A> {
    id: SubscriberId,
    handler: Handler<A>,
}

impl<A> Clone for Binding<A> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            handler: Rc::clone(&self.handler),
        }
    }
}

/// Ordered subscriber bindings for one argument type.
///
/// Insertion order is invocation order. Subscribing the same identity twice
/// yields two calls per publish.
pub struct EventChannel<A> {
    name: String,
    bindings: Vec<Binding<A>>,
}

impl<A: 'static> EventChannel<A> {
    /// Create an empty channel
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bindings: Vec::new(),
        }
    }

    /// Channel name used in diagnostics
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Append a free-function binding.
    pub fn subscribe<F, R>(&mut self, id: SubscriberId, handler: F)
    where
        F: Fn(&A) -> R + 'static,
        R: HandlerOutput,
    {
        self.push(
            id,
            Rc::new(move |args: &A| match handler(args).into_result() {
                Ok(()) => Outcome::Delivered,
                Err(e) => Outcome::Failed(e),
            }),
        );
    }

    fn push(&mut self, id: SubscriberId, handler: Handler<A>) {
        self.bindings.push(Binding { id, handler });
    }

    /// Remove every binding registered under `id`.
    ///
    /// Returns how many were removed; zero is not an error.
    pub fn unsubscribe(&mut self, id: SubscriberId) -> usize {
        let before = self.bindings.len();
        self.bindings.retain(|binding| binding.id != id);
        before - self.bindings.len()
    }

    /// Whether `id` has at least one binding here
    #[must_use]
    pub fn contains(&self, id: SubscriberId) -> bool {
        self.bindings.iter().any(|binding| binding.id == id)
    }

    /// Number of bindings
    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    /// Whether the channel has no bindings
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Call every binding with `args`, in order.
    ///
    /// # Errors
    ///
    /// Under `DispatchPolicy::FailFast`, returns the first handler failure;
    /// later bindings are not called.
    pub fn invoke(&mut self, args: &A, policy: DispatchPolicy) -> Result<(), EventError> {
        let report = dispatch(&self.name, &self.bindings, args, policy);
        self.prune(&report.orphaned);
        report.result
    }

    fn prune(&mut self, orphaned: &[Handler<A>]) {
        if orphaned.is_empty() {
            return;
        }
        self.bindings
            .retain(|binding| !orphaned.iter().any(|o| Rc::ptr_eq(o, &binding.handler)));
        log::warn!(
            "Pruned {} binding(s) of dropped subscribers from '{}'",
            orphaned.len(),
            self.name
        );
    }
}

struct DispatchReport<A> {
    result: Result<(), EventError>,
    orphaned: Vec<Handler<A>>,
}

fn dispatch<A: 'static>(
    name: &str,
    bindings: &[Binding<A>],
    args: &A,
    policy: DispatchPolicy,
) -> DispatchReport<A> {
    let mut orphaned = Vec::new();

    for binding in bindings {
        let error = match (binding.handler)(args) {
            Outcome::Delivered => continue,
            Outcome::Orphaned => {
                orphaned.push(Rc::clone(&binding.handler));
                continue;
            }
            Outcome::Failed(source) => EventError::Handler {
                channel: name.to_owned(),
                subscriber: binding.id,
                source,
            },
            Outcome::Busy => EventError::SubscriberBusy {
                channel: name.to_owned(),
                subscriber: binding.id,
            },
        };

        match policy {
            DispatchPolicy::FailFast => {
                return DispatchReport {
                    result: Err(error),
                    orphaned,
                };
            }
            DispatchPolicy::Isolate => log::error!("{error}"),
        }
    }

    DispatchReport {
        result: Ok(()),
        orphaned,
    }
}

/// Argument-type-independent view of a channel
trait ErasedChannel {
    fn arg_type(&self) -> &'static str;
    fn unsubscribe(&mut self, id: SubscriberId) -> usize;
    fn len(&self) -> usize;
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<A: 'static> ErasedChannel for EventChannel<A> {
    fn arg_type(&self) -> &'static str {
        type_name::<A>()
    }

    fn unsubscribe(&mut self, id: SubscriberId) -> usize {
        EventChannel::unsubscribe(self, id)
    }

    fn len(&self) -> usize {
        self.bindings.len()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

fn type_mismatch(name: &str, found: &'static str, expected: &'static str) -> ! {
    panic!("event channel '{name}' carries `{found}`, not `{expected}`")
}

// ============================================================================
// Event Registry
// ============================================================================

#[derive(Default)]
struct RegistryState {
    channels: FxHashMap<String, Box<dyn ErasedChannel>>,
    policy: DispatchPolicy,
}

impl RegistryState {
    /// Get or lazily create the channel for `name`.
    fn channel_mut<A: 'static>(&mut self, name: &str) -> &mut EventChannel<A> {
        let channel = self.channels.entry(name.to_owned()).or_insert_with(|| {
            log::debug!("Creating event channel '{name}' for `{}`", type_name::<A>());
            Box::new(EventChannel::<A>::new(name))
        });
        let found = channel.arg_type();
        match channel.as_any_mut().downcast_mut::<EventChannel<A>>() {
            Some(channel) => channel,
            None => type_mismatch(name, found, type_name::<A>()),
        }
    }
}

/// Process-wide map from channel name to channel.
///
/// Cloning yields another handle to the same registry. Every channel is
/// released by `clear()` or when the last handle is dropped.
///
/// # Panics
///
/// Subscribing to or invoking a string-named channel with an argument type
/// other than the one it was created with panics. This is a programming
/// error; use `EventKey` constants to rule it out at compile time.
#[derive(Clone, Default)]
pub struct EventRegistry {
    state: Rc<RefCell<RegistryState>>,
}

impl EventRegistry {
    /// Create an empty registry with the default fail-fast policy
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with the given dispatch policy
    #[must_use]
    pub fn with_policy(policy: DispatchPolicy) -> Self {
        let registry = Self::new();
        registry.set_policy(policy);
        registry
    }

    /// Current dispatch policy
    #[must_use]
    pub fn policy(&self) -> DispatchPolicy {
        self.state.borrow().policy
    }

    /// Change the dispatch policy for subsequent publishes
    pub fn set_policy(&self, policy: DispatchPolicy) {
        self.state.borrow_mut().policy = policy;
    }

    /// Bind a free function (or closure) under a caller-supplied identity.
    pub fn subscribe<A, F, R>(&self, key: impl ChannelKey<A>, id: SubscriberId, handler: F)
    where
        A: 'static,
        F: Fn(&A) -> R + 'static,
        R: HandlerOutput,
    {
        let mut state = self.state.borrow_mut();
        state
            .channel_mut::<A>(key.channel_name())
            .subscribe(id, handler);
    }

    /// Bind a method of a shared object; the object is its own identity.
    ///
    /// Only a weak reference is kept. If `target` is dropped while still
    /// bound, the binding is skipped and pruned on the next publish.
    pub fn subscribe_method<T, A, F, R>(
        &self,
        key: impl ChannelKey<A>,
        target: &Rc<RefCell<T>>,
        method: F,
    ) -> SubscriberId
    where
        T: 'static,
        A: 'static,
        F: Fn(&mut T, &A) -> R + 'static,
        R: HandlerOutput,
    {
        let id = SubscriberId::of(target);
        let weak = Rc::downgrade(target);

        let handler: Handler<A> = Rc::new(move |args: &A| {
            let Some(strong) = weak.upgrade() else {
                return Outcome::Orphaned;
            };
            let Ok(mut guard) = strong.try_borrow_mut() else {
                return Outcome::Busy;
            };
            match method(&mut *guard, args).into_result() {
                Ok(()) => Outcome::Delivered,
                Err(e) => Outcome::Failed(e),
            }
        });

        let mut state = self.state.borrow_mut();
        state.channel_mut::<A>(key.channel_name()).push(id, handler);
        id
    }

    /// Remove every binding of `id` from the named channel.
    ///
    /// Unknown channels and identities are ignored. Returns the number of
    /// bindings removed.
    pub fn unsubscribe(&self, key: impl ChannelName, id: SubscriberId) -> usize {
        let mut state = self.state.borrow_mut();
        state
            .channels
            .get_mut(key.channel_name())
            .map_or(0, |channel| channel.unsubscribe(id))
    }

    /// Publish `args` to every binding of the named channel.
    ///
    /// Publishing to a channel nobody subscribed to is a no-op. The binding
    /// list is snapshotted first, so handlers may subscribe, unsubscribe or
    /// publish; such changes apply from the next publish.
    ///
    /// # Errors
    ///
    /// Returns the first handler failure under `DispatchPolicy::FailFast`.
    pub fn invoke<A: 'static>(&self, key: impl ChannelKey<A>, args: &A) -> Result<(), EventError> {
        let name = key.channel_name();

        let (bindings, policy) = {
            let state = self.state.borrow();
            let Some(erased) = state.channels.get(name) else {
                return Ok(());
            };
            let Some(channel) = erased.as_any().downcast_ref::<EventChannel<A>>() else {
                type_mismatch(name, erased.arg_type(), type_name::<A>());
            };
            if channel.is_empty() {
                return Ok(());
            }
            (channel.bindings.clone(), state.policy)
        };

        log::trace!("Dispatching '{name}' to {} binding(s)", bindings.len());
        let report = dispatch(name, &bindings, args, policy);

        if !report.orphaned.is_empty() {
            let mut state = self.state.borrow_mut();
            if let Some(channel) = state
                .channels
                .get_mut(name)
                .and_then(|erased| erased.as_any_mut().downcast_mut::<EventChannel<A>>())
            {
                channel.prune(&report.orphaned);
            }
        }

        report.result
    }

    /// Number of bindings on the named channel (zero if it does not exist)
    #[must_use]
    pub fn subscriber_count(&self, key: impl ChannelName) -> usize {
        self.state
            .borrow()
            .channels
            .get(key.channel_name())
            .map_or(0, |channel| channel.len())
    }

    /// Whether the named channel has been created
    #[must_use]
    pub fn has_channel(&self, key: impl ChannelName) -> bool {
        self.state
            .borrow()
            .channels
            .contains_key(key.channel_name())
    }

    /// Number of channels created so far
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.state.borrow().channels.len()
    }

    /// Release every channel and binding.
    pub fn clear(&self) {
        let mut state = self.state.borrow_mut();
        log::debug!("Releasing {} event channel(s)", state.channels.len());
        state.channels.clear();
    }
}

impl fmt::Debug for EventRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        let mut map = f.debug_map();
        for (name, channel) in &state.channels {
            map.entry(name, &format_args!("{} x{}", channel.arg_type(), channel.len()));
        }
        map.finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
