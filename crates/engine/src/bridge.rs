//! The lifecycle bridge.
//!
//! Subscribes to the event bus and routes each event to its consumers:
//! incident creation starts escalation (when a policy is bound) and
//! feeds the trigger matcher; acknowledge/resolve/archive cancel any
//! pending escalation; every event reaches the workflow engine.
//! A workflow failure here never touches the incident: errors are
//! logged and the loop keeps draining.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use vigil_escalation::EscalationScheduler;
use vigil_eventbus::{EventBus, LifecycleEvent, LifecycleKind};
use vigil_incident::IncidentStore;

use crate::engine::WorkflowEngine;

/// The bus-to-engines bridge.
pub struct LifecycleBridge {
    bus: Arc<EventBus>,
    engine: Arc<WorkflowEngine>,
    escalation: Arc<EscalationScheduler>,
    incidents: Arc<dyn IncidentStore>,
    cancel: CancellationToken,
    handle: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl LifecycleBridge {
    /// Wire the bridge.
    #[must_use]
    pub fn new(
        bus: Arc<EventBus>,
        engine: Arc<WorkflowEngine>,
        escalation: Arc<EscalationScheduler>,
        incidents: Arc<dyn IncidentStore>,
    ) -> Self {
        Self {
            bus,
            engine,
            escalation,
            incidents,
            cancel: CancellationToken::new(),
            handle: Mutex::new(None),
        }
    }

    /// Start draining the bus. A second call is a no-op.
    pub fn start(self: Arc<Self>) {
        let mut guard = self.handle.lock();
        if guard.is_some() {
            return;
        }
        let bridge = Arc::clone(&self);
        let cancel = self.cancel.clone();
        let mut rx = self.bus.subscribe();
        *guard = Some(tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = cancel.cancelled() => break,
                    received = rx.recv() => match received {
                        Ok(event) => bridge.dispatch(event).await,
                        Err(RecvError::Lagged(missed)) => {
                            tracing::warn!(missed, "lifecycle bridge lagged; events dropped");
                        }
                        Err(RecvError::Closed) => break,
                    },
                }
            }
        }));
        tracing::info!("lifecycle bridge started");
    }

    /// Stop draining and wait for the in-flight dispatch. Idempotent.
    pub async fn stop(&self) {
        self.cancel.cancel();
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        tracing::info!("lifecycle bridge stopped");
    }

    /// Route one event. Public so tests can drive the bridge without
    /// the subscription task.
    pub async fn dispatch(&self, event: LifecycleEvent) {
        match &event.kind {
            LifecycleKind::Created => self.on_created(&event).await,
            LifecycleKind::StateChanged { to, .. } => {
                // A responder took over (or the incident left the active
                // set): pending escalation becomes moot.
                if matches!(to.as_str(), "ACKNOWLEDGED" | "RESOLVED" | "ARCHIVED")
                    && let Err(error) = self.escalation.cancel(event.incident_id).await
                {
                    tracing::error!(
                        incident_id = %event.incident_id,
                        error = %error,
                        "escalation cancel failed"
                    );
                }
            }
            LifecycleKind::Escalated { .. } => {}
        }

        if let Err(error) = self.engine.on_event(&event).await {
            tracing::error!(
                incident_id = %event.incident_id,
                event = event.kind.action(),
                error = %error,
                "workflow matching failed"
            );
        }
    }

    async fn on_created(&self, event: &LifecycleEvent) {
        let incident = match self.incidents.get(event.incident_id).await {
            Ok(Some(incident)) => incident,
            Ok(None) => return,
            Err(error) => {
                tracing::error!(incident_id = %event.incident_id, error = %error, "incident load failed");
                return;
            }
        };
        if incident.policy_id.is_none() {
            return;
        }
        if let Err(error) = self.escalation.start(&incident).await {
            tracing::error!(
                incident_id = %incident.id,
                error = %error,
                "escalation start failed"
            );
        }
    }
}
