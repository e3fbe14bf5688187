//! Callback surface handed to a Newton–Krylov solver.
//!
//! The solver sees one object implementing [`NonlinearCallbacks`]; every callback returns an
//! integer status (0 success, positive recoverable, negative fatal) and never panics.
//! [`FlameSystem`] is that object: a [`FlameSession`] plus the preconditioner chosen in the
//! configuration, dispatched statically through [`FlamePreconditioner`].
use crate::CounterflowFlame::af_preconditioner::AfPreconditioner;
use crate::CounterflowFlame::bbd_preconditioner::BbdPreconditioner;
use crate::CounterflowFlame::flame_config::PreconditionerKind;
use crate::CounterflowFlame::flame_errors::FlameError;
use crate::CounterflowFlame::flame_session::FlameSession;
use enum_dispatch::enum_dispatch;
use log::{error, warn};

/// bumped whenever the callback signatures change
pub const INTERFACE_VERSION: u32 = 1;

#[enum_dispatch]
pub trait Preconditioner {
    /// Builds and factors the preconditioner at `state` (the locally owned values)
    fn setup(&mut self, session: &mut FlameSession, state: &[f64]) -> Result<(), FlameError>;
    /// Applies the inverse in place
    fn solve(&mut self, session: &FlameSession, rhs: &mut [f64]) -> Result<(), FlameError>;
    /// The next setup starts a fresh symbolic factorization
    fn invalidate_pattern(&mut self);
}

#[enum_dispatch(Preconditioner)]
pub enum FlamePreconditioner {
    Bbd(BbdPreconditioner),
    Af(AfPreconditioner),
}

pub trait NonlinearCallbacks {
    fn interface_version(&self) -> u32 {
        INTERFACE_VERSION
    }
    fn residual(&mut self, state: &[f64], residual: &mut [f64]) -> i32;
    fn preconditioner_setup(&mut self, state: &[f64]) -> i32;
    fn preconditioner_solve(&mut self, rhs: &mut [f64]) -> i32;
}

pub struct FlameSystem {
    pub session: FlameSession,
    pub preconditioner: FlamePreconditioner,
}

impl FlameSystem {
    pub fn new(session: FlameSession) -> Result<Self, FlameError> {
        let preconditioner = match session.config.preconditioner {
            PreconditionerKind::Bbd => FlamePreconditioner::from(BbdPreconditioner::new(&session)),
            PreconditionerKind::ApproximateFactorization => {
                FlamePreconditioner::from(AfPreconditioner::new(&session)?)
            }
        };
        Ok(Self {
            session,
            preconditioner,
        })
    }

    pub fn setup(&mut self, state: &[f64]) -> Result<(), FlameError> {
        self.preconditioner.setup(&mut self.session, state)
    }

    pub fn solve(&mut self, rhs: &mut [f64]) -> Result<(), FlameError> {
        self.preconditioner.solve(&self.session, rhs)
    }

    fn report(&self, callback: &str, err: &FlameError) -> i32 {
        let code = err.status_code();
        if self.session.decomposition.is_first_rank() {
            if code > 0 {
                warn!("{} failed (recoverable, status {}): {}", callback, code, err);
            } else {
                error!("{} failed (status {}): {}", callback, code, err);
            }
        }
        code
    }
}

impl NonlinearCallbacks for FlameSystem {
    fn residual(&mut self, state: &[f64], residual: &mut [f64]) -> i32 {
        match self.session.residual(state, residual) {
            Ok(()) => 0,
            Err(e) => self.report("residual", &e),
        }
    }

    fn preconditioner_setup(&mut self, state: &[f64]) -> i32 {
        match self.setup(state) {
            Ok(()) => 0,
            Err(e) => self.report("preconditioner setup", &e),
        }
    }

    fn preconditioner_solve(&mut self, rhs: &mut [f64]) -> i32 {
        match self.solve(rhs) {
            Ok(()) => 0,
            Err(e) => self.report("preconditioner solve", &e),
        }
    }
}
