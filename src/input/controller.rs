//! Controllers: stateful objects driven by per-frame input
//!
//! Anything that reacts to input (a player, a fly camera, a debug panel)
//! implements `PlayerController` and is wrapped in a `Controller`, which
//! owns the object and manages its subscription to the `input` channel.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use super::state::InputSnapshot;
use crate::core::events::{self, EventRegistry, SubscriberId};

/// Receives the input snapshot once per frame while active.
pub trait PlayerController: 'static {
    /// React to this frame's input.
    fn input(&mut self, input: &InputSnapshot);

    /// Per-frame logic independent of input. Only called while bound to the
    /// `update` channel via `Controller::bind_update`.
    fn update(&mut self, _delta_time: f32) {}
}

/// Owns a `PlayerController` and its event bindings.
///
/// Activation subscribes the controller's `input` method; deactivation or
/// drop removes every binding the controller made.
pub struct Controller<T: PlayerController> {
    inner: Rc<RefCell<T>>,
    id: SubscriberId,
    registry: EventRegistry,
    active: bool,
    update_bound: bool,
}

impl<T: PlayerController> Controller<T> {
    /// Wrap `controller`; it starts inactive.
    pub fn new(registry: &EventRegistry, controller: T) -> Self {
        let inner = Rc::new(RefCell::new(controller));
        let id = SubscriberId::of(&inner);
        Self {
            inner,
            id,
            registry: registry.clone(),
            active: false,
            update_bound: false,
        }
    }

    /// Toggle input delivery. Re-asserting the current state does nothing.
    pub fn set_active(&mut self, active: bool) {
        if self.active == active {
            return;
        }

        if active {
            self.registry
                .subscribe_method(events::INPUT, &self.inner, T::input);
        } else {
            self.registry.unsubscribe(events::INPUT, self.id);
        }
        self.active = active;
        log::debug!("Controller {:?} active: {active}", self.id);
    }

    /// Whether the controller currently receives input
    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Subscribe `PlayerController::update` to the `update` channel.
    pub fn bind_update(&mut self) {
        if self.update_bound {
            return;
        }
        self.registry
            .subscribe_method(events::UPDATE, &self.inner, |controller: &mut T, dt: &f32| {
                controller.update(*dt);
            });
        self.update_bound = true;
    }

    /// Remove the `update` binding.
    pub fn unbind_update(&mut self) {
        if self.update_bound {
            self.registry.unsubscribe(events::UPDATE, self.id);
            self.update_bound = false;
        }
    }

    /// Identity used for this controller's bindings
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Borrow the controller.
    ///
    /// # Panics
    ///
    /// Panics if called from inside the controller's own callback.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.inner.borrow()
    }

    /// Mutably borrow the controller.
    ///
    /// # Panics
    ///
    /// Panics if called from inside the controller's own callback.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.inner.borrow_mut()
    }

    /// Shared handle, for binding further methods of the controller.
    pub fn shared(&self) -> &Rc<RefCell<T>> {
        &self.inner
    }
}

impl<T: PlayerController> Drop for Controller<T> {
    fn drop(&mut self) {
        self.set_active(false);
        self.unbind_update();
    }
}
