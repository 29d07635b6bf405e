/// Debounced re-application of blur rules when the page grows
use std::cell::RefCell;
use std::rc::Rc;

use js_sys::Array;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::{MutationObserver, MutationObserverInit, MutationRecord, Node};

use crate::bridge::describe;
use crate::error::{BlurError, Result};

/// Quiet period before a burst of insertions triggers one re-apply.
pub const DEBOUNCE_MS: u32 = 500;

/// Something that can run a task later and cancel it before it runs.
pub trait TimerHost {
    type Handle: 'static;

    fn set_timeout(&self, delay_ms: u32, task: Box<dyn FnOnce()>) -> Self::Handle;
    fn clear_timeout(&self, handle: Self::Handle);
}

/// Single-slot scheduled task: scheduling again cancels the pending run.
pub struct Debouncer<T: TimerHost> {
    host: T,
    delay_ms: u32,
    pending: Rc<RefCell<Option<T::Handle>>>,
}

impl<T: TimerHost> Debouncer<T> {
    pub fn new(host: T, delay_ms: u32) -> Self {
        Debouncer {
            host,
            delay_ms,
            pending: Rc::new(RefCell::new(None)),
        }
    }

    pub fn schedule(&self, task: impl FnOnce() + 'static) {
        self.cancel();

        let slot = Rc::clone(&self.pending);
        let handle = self.host.set_timeout(
            self.delay_ms,
            Box::new(move || {
                let finished = slot.borrow_mut().take();
                drop(finished);
                task();
            }),
        );
        *self.pending.borrow_mut() = Some(handle);
    }

    pub fn cancel(&self) {
        let pending = self.pending.borrow_mut().take();
        if let Some(handle) = pending {
            self.host.clear_timeout(handle);
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.borrow().is_some()
    }
}

/// Kind of a DOM mutation record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    Attributes,
    CharacterData,
}

impl MutationKind {
    pub fn parse(kind: &str) -> Option<MutationKind> {
        match kind {
            "childList" => Some(MutationKind::ChildList),
            "attributes" => Some(MutationKind::Attributes),
            "characterData" => Some(MutationKind::CharacterData),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationSummary {
    pub kind: MutationKind,
    pub added_nodes: u32,
}

impl MutationSummary {
    /// Only node insertions require new blur coverage.
    pub fn is_insertion(&self) -> bool {
        self.kind == MutationKind::ChildList && self.added_nodes > 0
    }
}

/// Turns mutation batches into at most one re-apply per debounce window.
pub struct Reconciler<T: TimerHost> {
    debouncer: Debouncer<T>,
    reapply: Rc<dyn Fn()>,
}

impl<T: TimerHost> Reconciler<T> {
    pub fn new(host: T, delay_ms: u32, reapply: Rc<dyn Fn()>) -> Self {
        Reconciler {
            debouncer: Debouncer::new(host, delay_ms),
            reapply,
        }
    }

    /// Returns true when the batch (re)scheduled a re-apply.
    pub fn on_mutations<I>(&self, batch: I) -> bool
    where
        I: IntoIterator<Item = MutationSummary>,
    {
        if !batch.into_iter().any(|m| m.is_insertion()) {
            return false;
        }

        let reapply = Rc::clone(&self.reapply);
        self.debouncer.schedule(move || reapply());
        true
    }

    pub fn is_pending(&self) -> bool {
        self.debouncer.is_pending()
    }

    pub fn cancel(&self) {
        self.debouncer.cancel();
    }
}

/// `window.setTimeout` backed timers.
#[derive(Debug, Default, Clone, Copy)]
pub struct BrowserTimers;

pub struct BrowserTimeout {
    id: Option<i32>,
    _callback: Closure<dyn FnMut()>,
}

impl TimerHost for BrowserTimers {
    type Handle = BrowserTimeout;

    fn set_timeout(&self, delay_ms: u32, task: Box<dyn FnOnce()>) -> BrowserTimeout {
        let mut task = Some(task);
        let callback = Closure::wrap(Box::new(move || {
            if let Some(task) = task.take() {
                task();
            }
        }) as Box<dyn FnMut()>);

        let id = web_sys::window().and_then(|window| {
            window
                .set_timeout_with_callback_and_timeout_and_arguments_0(
                    callback.as_ref().unchecked_ref(),
                    delay_ms as i32,
                )
                .map_err(|e| log::warn!("setTimeout failed: {}", describe(&e)))
                .ok()
        });

        BrowserTimeout {
            id,
            _callback: callback,
        }
    }

    fn clear_timeout(&self, handle: BrowserTimeout) {
        if let (Some(window), Some(id)) = (web_sys::window(), handle.id) {
            window.clear_timeout_with_handle(id);
        }
    }
}

/// A live `MutationObserver` feeding a reconciler. Disconnects on drop.
pub struct MutationWatch {
    observer: MutationObserver,
    _callback: Closure<dyn FnMut(Array, MutationObserver)>,
}

impl MutationWatch {
    pub fn observe<T>(target: &Node, reconciler: Rc<Reconciler<T>>) -> Result<MutationWatch>
    where
        T: TimerHost + 'static,
    {
        let callback = Closure::wrap(Box::new(move |records: Array, _: MutationObserver| {
            let batch = records
                .iter()
                .filter_map(|record| record.dyn_into::<MutationRecord>().ok())
                .filter_map(|record| {
                    MutationKind::parse(&record.type_()).map(|kind| MutationSummary {
                        kind,
                        added_nodes: record.added_nodes().length(),
                    })
                });
            reconciler.on_mutations(batch);
        }) as Box<dyn FnMut(Array, MutationObserver)>);

        let observer = MutationObserver::new(callback.as_ref().unchecked_ref())
            .map_err(|e| BlurError::dom(describe(&e)))?;

        let init = MutationObserverInit::new();
        init.set_child_list(true);
        init.set_subtree(true);
        observer
            .observe_with_options(target, &init)
            .map_err(|e| BlurError::dom(describe(&e)))?;

        Ok(MutationWatch {
            observer,
            _callback: callback,
        })
    }
}

impl Drop for MutationWatch {
    fn drop(&mut self) {
        self.observer.disconnect();
    }
}
