use crate::{Conversion, Profile, Timed, Timer};

/// A configurable profile for unit tests.
#[derive(Clone, Debug, Default)]
pub(crate) struct StubProfile {
    pub id: u32,
    pub dependency: Option<u32>,
    pub body: String,
    pub conversion: u64,
    pub invalid: bool,
    /// When set, only anchors whose body equals this are accepted.
    pub anchor_body: Option<String>,
    pub verbose: bool,
    pub pre_processed: bool,
    pub timer: Option<Timer>,
}

impl StubProfile {
    pub fn new(id: u32, body: impl Into<String>) -> Self {
        Self {
            id,
            body: body.into(),
            conversion: u64::from(id),
            ..Self::default()
        }
    }

    pub fn depends_on(mut self, dependency: u32) -> Self {
        self.dependency = Some(dependency);
        self
    }

    pub fn anchored_to(mut self, body: impl Into<String>) -> Self {
        self.anchor_body = Some(body.into());
        self
    }

    pub fn invalid(mut self) -> Self {
        self.invalid = true;
        self
    }

    pub fn boxed(self) -> Box<dyn Profile> {
        Box::new(self)
    }
}

impl Profile for StubProfile {
    fn id(&self) -> u32 {
        self.id
    }

    fn dependency_id(&self) -> Option<u32> {
        self.dependency
    }

    fn predicate(&self, anchor: &dyn Profile) -> bool {
        self.anchor_body
            .as_deref()
            .is_none_or(|body| anchor.convert().body() == body)
    }

    fn set_verbosity(&mut self, verbose: bool) {
        self.verbose = verbose;
    }

    fn pre_process(&mut self) {
        self.pre_processed = true;
    }

    fn invalidate(&mut self) -> bool {
        self.invalid
    }

    fn convert(&self) -> Conversion {
        let mut body = self.body.clone();
        if self.verbose {
            body.push('!');
        }
        Conversion::flat(self.conversion, body)
    }
}

impl Timed for StubProfile {
    fn set_timer(&mut self, timer: Timer) {
        self.timer = Some(timer);
    }
}

/// Collects the bodies of `profiles` in order.
pub(crate) fn bodies(profiles: &[Box<dyn Profile>]) -> Vec<String> {
    profiles
        .iter()
        .map(|p| p.convert().body().to_owned())
        .collect()
}
