//! Service facade wiring the core components over one store

use std::sync::Arc;

use crate::database::MeetupStore;
use crate::meetings::{ApplicationWorkflow, MeetingLifecycle};
use crate::profiles::ProfileService;
use crate::reputation::{ScoreKeeper, TrustGate, TrustThresholds};

pub struct MeetupCore<S: MeetupStore> {
    pub meetings: MeetingLifecycle<S>,
    pub applications: ApplicationWorkflow<S>,
    pub scores: ScoreKeeper<S>,
    pub profiles: ProfileService<S>,
    pub gate: TrustGate,
    store: Arc<S>,
}

impl<S: MeetupStore> MeetupCore<S> {
    pub fn new(store: Arc<S>, thresholds: TrustThresholds) -> Self {
        let gate = TrustGate::new(thresholds.clone());
        Self {
            meetings: MeetingLifecycle::new(Arc::clone(&store), gate.clone()),
            applications: ApplicationWorkflow::new(Arc::clone(&store), gate.clone()),
            scores: ScoreKeeper::new(Arc::clone(&store)),
            profiles: ProfileService::new(Arc::clone(&store), &thresholds),
            gate,
            store,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}
