/// Solver errors.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HomotopyError
{
    /// Failure to create a backend context or to allocate its buffers.
    Resource,
    /// Failure reported by a backend linear algebra call.
    Device,
    /// Operation invoked out of lifecycle order.
    State
    {
        /// Name of the rejected operation.
        op: &'static str,
        /// Name of the state it was invoked in.
        state: &'static str,
    },
    /// No valid next breakpoint; `lambda` is the last valid regularization value.
    Divergence
    {
        lambda: f64,
    },
    /// A column to be activated is linearly dependent on the active ones.
    Singular,
    /// Active set already holds as many columns as the backend can factorize.
    ActiveSetFull,

    /// Invalid [`crate::solver::Operator`] or backend shape.
    InvalidOp,
    /// Vector length does not match the operator.
    InvalidLen
    {
        expected: usize,
        actual: usize,
    },
    /// Invalid parameter value.
    InvalidParam,
}

impl core::fmt::Display for HomotopyError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self {
            HomotopyError::Resource      => write!(f, "Resource: failed to create backend resources"),
            HomotopyError::Device        => write!(f, "Device: backend linear algebra call failed"),
            HomotopyError::State {op, state} => write!(f, "State: `{}` is not allowed in state {}", op, state),
            HomotopyError::Divergence {lambda} => write!(f, "Divergence: no valid breakpoint below lambda {:e}", lambda),
            HomotopyError::Singular      => write!(f, "Singular: dependent column for the active set"),
            HomotopyError::ActiveSetFull => write!(f, "ActiveSetFull: active set reached its capacity"),
            HomotopyError::InvalidOp     => write!(f, "InvalidOp: invalid Operator"),
            HomotopyError::InvalidLen {expected, actual} => write!(f, "InvalidLen: length {} must be {}", actual, expected),
            HomotopyError::InvalidParam  => write!(f, "InvalidParam: invalid parameter"),
        }
    }
}

//

#[cfg(feature = "std")]
extern crate std;

#[cfg(feature = "std")]
impl std::error::Error for HomotopyError {}
