//! Coalescing regeneration of the derived tray state.
//!
//! One consumer thread owns the presenter. Fact changes that arrive while
//! a regeneration is in flight collapse into exactly one follow-up
//! regeneration reflecting only the latest facts; intermediate values are
//! never rendered.

use std::sync::mpsc::{Receiver, TryRecvError};

use tracing::{debug, error, warn};

use crate::model::{TrayFacts, TrayModel};
use crate::presenter::TrayPresenter;

const RESYNC_TARGET: &str = "bosun_tray::resync";

/// Drives the presenter from a stream of fact changes.
#[derive(Debug)]
pub struct ResyncController {
    source: Receiver<TrayFacts>,
    presenter: Box<dyn TrayPresenter>,
}

impl ResyncController {
    /// Builds a controller over the fact stream and presenter.
    #[must_use]
    pub fn new(source: Receiver<TrayFacts>, presenter: Box<dyn TrayPresenter>) -> Self {
        Self { source, presenter }
    }

    /// Processes fact changes until every sender is dropped.
    pub fn run(mut self) {
        while let Ok(facts) = self.source.recv() {
            self.cycle(facts);
        }
        debug!(target: RESYNC_TARGET, "fact stream ended; resync loop exiting");
    }

    /// Runs one coalesced regeneration cycle starting from `facts`.
    ///
    /// Changes queued before the regeneration starts are collapsed into it;
    /// changes arriving while it runs trigger one follow-up pass each
    /// round, again collapsed to the latest value.
    fn cycle(&mut self, facts: TrayFacts) {
        let mut facts = facts;
        loop {
            // Later queued changes overwrite earlier ones.
            while let Ok(next) = self.source.try_recv() {
                facts = next;
            }

            self.regenerate(&facts);

            match self.source.try_recv() {
                Ok(next) => facts = next,
                Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
            }
        }
    }

    /// Derives and installs a fresh model, falling back to a full rebuild.
    fn regenerate(&mut self, facts: &TrayFacts) {
        let model = TrayModel::derive(facts);
        if let Err(apply_error) = self.presenter.apply(&model) {
            warn!(
                target: RESYNC_TARGET,
                error = %apply_error,
                "apply failed; rebuilding the presentation handle"
            );
            if let Err(rebuild_error) = self.presenter.rebuild(&model) {
                error!(
                    target: RESYNC_TARGET,
                    error = %rebuild_error,
                    "rebuild failed; view stays stale until the next change"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presenter::PresenterError;
    use std::sync::mpsc::{Sender, channel};
    use std::sync::{Arc, Mutex};

    /// Presenter double that records models and can inject fact changes
    /// mid-apply, simulating changes arriving while a regeneration is in
    /// flight.
    struct ScriptedPresenter {
        applied: Arc<Mutex<Vec<TrayModel>>>,
        rebuilt: Arc<Mutex<Vec<TrayModel>>>,
        inject_during_first_apply: Mutex<Vec<TrayFacts>>,
        injector: Sender<TrayFacts>,
        failing_applies: Mutex<usize>,
        fail_rebuild: bool,
    }

    impl ScriptedPresenter {
        fn new(injector: Sender<TrayFacts>) -> Self {
            Self {
                applied: Arc::new(Mutex::new(Vec::new())),
                rebuilt: Arc::new(Mutex::new(Vec::new())),
                inject_during_first_apply: Mutex::new(Vec::new()),
                injector,
                failing_applies: Mutex::new(0),
                fail_rebuild: false,
            }
        }

        fn applied_handle(&self) -> Arc<Mutex<Vec<TrayModel>>> {
            Arc::clone(&self.applied)
        }

        fn rebuilt_handle(&self) -> Arc<Mutex<Vec<TrayModel>>> {
            Arc::clone(&self.rebuilt)
        }

        fn inject_on_first_apply(self, facts: Vec<TrayFacts>) -> Self {
            *self
                .inject_during_first_apply
                .lock()
                .expect("presenter poisoned") = facts;
            self
        }

        fn failing_applies(self, count: usize) -> Self {
            *self.failing_applies.lock().expect("presenter poisoned") = count;
            self
        }

        fn failing_rebuild(mut self) -> Self {
            self.fail_rebuild = true;
            self
        }
    }

    impl TrayPresenter for ScriptedPresenter {
        fn apply(&mut self, model: &TrayModel) -> Result<(), PresenterError> {
            let pending: Vec<TrayFacts> = self
                .inject_during_first_apply
                .lock()
                .expect("presenter poisoned")
                .drain(..)
                .collect();
            for facts in pending {
                self.injector.send(facts).expect("injector disconnected");
            }

            let mut failing = self.failing_applies.lock().expect("presenter poisoned");
            if *failing > 0 {
                *failing -= 1;
                return Err(PresenterError::new("scripted apply failure"));
            }
            drop(failing);

            self.applied
                .lock()
                .expect("presenter poisoned")
                .push(model.clone());
            Ok(())
        }

        fn rebuild(&mut self, model: &TrayModel) -> Result<(), PresenterError> {
            if self.fail_rebuild {
                return Err(PresenterError::new("scripted rebuild failure"));
            }
            self.rebuilt
                .lock()
                .expect("presenter poisoned")
                .push(model.clone());
            Ok(())
        }
    }

    fn facts_with_profile(profile: &str) -> TrayFacts {
        TrayFacts {
            active_profile: Some(profile.to_owned()),
            ..TrayFacts::default()
        }
    }

    #[test]
    fn queued_changes_collapse_to_the_latest() {
        let (sender, receiver) = channel();
        let presenter = ScriptedPresenter::new(sender.clone());
        let applied = presenter.applied_handle();
        let mut controller = ResyncController::new(receiver, Box::new(presenter));

        sender.send(facts_with_profile("one")).expect("send");
        sender.send(facts_with_profile("two")).expect("send");
        sender.send(facts_with_profile("three")).expect("send");
        sender.send(facts_with_profile("four")).expect("send");
        // The first recv yields "one"; the rest are queued and must
        // collapse into a single regeneration of the latest value.
        let facts = controller.source.recv().expect("facts queued");
        controller.cycle(facts);

        let applied = applied.lock().expect("poisoned");
        assert_eq!(applied.len(), 1);
        assert_eq!(applied[0], TrayModel::derive(&facts_with_profile("four")));
    }

    #[test]
    fn changes_during_a_regeneration_trigger_exactly_one_follow_up() {
        let (sender, receiver) = channel();
        let presenter = ScriptedPresenter::new(sender.clone()).inject_on_first_apply(vec![
            facts_with_profile("a"),
            facts_with_profile("b"),
            facts_with_profile("c"),
        ]);
        let applied = presenter.applied_handle();
        let mut controller = ResyncController::new(receiver, Box::new(presenter));

        controller.cycle(TrayFacts::default());

        let applied = applied.lock().expect("poisoned");
        // One in-flight regeneration plus exactly one follow-up that
        // reflects only the latest injected facts.
        assert_eq!(applied.len(), 2);
        assert_eq!(applied[0], TrayModel::derive(&TrayFacts::default()));
        assert_eq!(applied[1], TrayModel::derive(&facts_with_profile("c")));
    }

    #[test]
    fn failed_apply_falls_back_to_rebuild() {
        let (sender, receiver) = channel();
        let presenter = ScriptedPresenter::new(sender).failing_applies(1);
        let rebuilt = presenter.rebuilt_handle();
        let mut controller = ResyncController::new(receiver, Box::new(presenter));

        controller.cycle(facts_with_profile("fallback"));

        let rebuilt = rebuilt.lock().expect("poisoned");
        assert_eq!(rebuilt.len(), 1);
        assert_eq!(rebuilt[0], TrayModel::derive(&facts_with_profile("fallback")));
    }

    #[test]
    fn failed_rebuild_waits_for_the_next_change() {
        let (sender, receiver) = channel();
        let presenter = ScriptedPresenter::new(sender)
            .failing_applies(1)
            .failing_rebuild();
        let applied = presenter.applied_handle();
        let mut controller = ResyncController::new(receiver, Box::new(presenter));

        controller.cycle(facts_with_profile("lost"));
        controller.cycle(facts_with_profile("recovered"));

        let applied = applied.lock().expect("poisoned");
        assert_eq!(applied.len(), 1);
        assert_eq!(
            applied[0],
            TrayModel::derive(&facts_with_profile("recovered"))
        );
    }
}
