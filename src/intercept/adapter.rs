//! Dispatch adapter factory.
//!
//! A [`CapabilityMethod`] is what reading a capability through a wrapper
//! yields. Calling it with the host's usual arguments (minus the callback)
//! creates a root stream, splices the stream's adapter into the arguments at
//! the registered callback position, and forwards the real call. Calling a
//! deregistering capability with a stream handle reverses that.

use std::fmt;

use tracing::{debug, warn};

use crate::capability::Direction;
use crate::engine::Engine;
use crate::error::{HookResult, InterceptError};
use crate::host::{unknown_method, Arg, HostRef, Member};
use crate::stream::Stream;

use super::wrapped::{wrap_member, Returned, Target};

/// A capability method bound to its target.
#[derive(Clone)]
pub struct CapabilityMethod {
    engine: Engine,
    target: Target,
    canonical: String,
}

impl CapabilityMethod {
    pub(crate) fn new(engine: Engine, target: Target, canonical: String) -> Self {
        Self {
            engine,
            target,
            canonical,
        }
    }

    /// Canonical method name this capability forwards to.
    #[must_use]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    /// Invoke the capability.
    ///
    /// Registering calls return [`Returned::Stream`]. Deregistering calls with
    /// a child stream detach it from its root without touching the host.
    ///
    /// # Errors
    /// `InterceptError::MissingStreamArgument` when a deregistering call has
    /// nothing at the callback position, plus anything the host reports.
    pub fn call(&self, mut args: Vec<Arg>) -> HookResult<Returned> {
        // Present by construction: the registry is append-only and this
        // method was only handed out after an `is_capability` check.
        let descriptor = self.engine.registry().get(&self.canonical)?;

        let Some(index) = descriptor.callback_index else {
            return self.forward(args);
        };

        match descriptor.direction {
            Direction::Register => {
                let stream = Stream::new();
                args.insert(index.min(args.len()), Arg::Callback(stream.adapter()));

                match &self.target {
                    Target::One(host) => {
                        if let Member::Value(value) = host.invoke(&self.canonical, args)? {
                            stream.capture_registration_value(value);
                        }
                    }
                    Target::Many(hosts) => self.register_all(hosts, &args, index)?,
                }

                debug!(method = %self.canonical, stream = %stream.id(), "registered stream");
                Ok(Returned::Stream(stream))
            }
            Direction::Deregister => {
                if index >= args.len() {
                    return Err(InterceptError::MissingStreamArgument {
                        method: self.canonical.clone(),
                        index,
                    }
                    .into());
                }

                let replacement = match args.remove(index) {
                    Arg::Stream(stream) if !stream.is_root() => {
                        // The host registration keeps feeding the siblings.
                        stream.root().remove(&stream);
                        return Ok(Returned::Nothing);
                    }
                    Arg::Stream(stream) => {
                        debug!(method = %self.canonical, stream = %stream.id(), "deregistering stream");
                        stream
                            .registration_value()
                            .map_or_else(|| Arg::Callback(stream.adapter()), Arg::Value)
                    }
                    other => other,
                };
                args.insert(index, replacement);
                self.forward(args)
            }
        }
    }

    fn forward(&self, args: Vec<Arg>) -> HookResult<Returned> {
        match &self.target {
            Target::One(host) => {
                let result = host.invoke(&self.canonical, args)?;
                Ok(wrap_member(&self.engine, result))
            }
            Target::Many(hosts) => {
                // Every member is attempted; the first failure is reported.
                let mut first_err = None;
                for host in hosts.iter() {
                    if let Err(err) = host.invoke(&self.canonical, args.clone()) {
                        warn!(method = %self.canonical, shape = host.shape(), %err, "collection member rejected call");
                        first_err.get_or_insert(err);
                    }
                }
                match first_err {
                    Some(err) => Err(err.into()),
                    None => Ok(Returned::Nothing),
                }
            }
        }
    }

    /// Install the same adapter on every member, or on none of them.
    ///
    /// Members are checked against the method table first. If a member still
    /// fails, the members already registered are deregistered again before
    /// the error is returned.
    fn register_all(&self, hosts: &[HostRef], args: &[Arg], index: usize) -> HookResult<()> {
        if let Some(host) = hosts.iter().find(|host| !host.has_method(&self.canonical)) {
            return Err(unknown_method(host.shape(), &self.canonical).into());
        }

        for (position, host) in hosts.iter().enumerate() {
            if let Err(err) = host.invoke(&self.canonical, args.to_vec()) {
                self.unregister(&hosts[..position], args, index);
                return Err(err.into());
            }
        }
        Ok(())
    }

    fn unregister(&self, installed: &[HostRef], args: &[Arg], index: usize) {
        let registry = self.engine.registry();
        for host in installed {
            // Any deregistering method on this host that takes the callback
            // at the same position undoes the registration.
            let undo = registry.names().into_iter().find(|name| {
                host.has_method(name)
                    && registry.get(name).is_ok_and(|descriptor| {
                        descriptor.direction == Direction::Deregister
                            && descriptor.callback_index == Some(index)
                    })
            });
            let Some(undo) = undo else {
                warn!(method = %self.canonical, shape = host.shape(), "no deregistering method to roll back with");
                continue;
            };
            if let Err(err) = host.invoke(&undo, args.to_vec()) {
                warn!(method = %undo, shape = host.shape(), %err, "rollback failed");
            }
        }
    }
}

impl fmt::Debug for CapabilityMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityMethod")
            .field("canonical", &self.canonical)
            .finish()
    }
}
