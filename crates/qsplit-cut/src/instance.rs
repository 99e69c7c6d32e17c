//! Boundary-condition enumeration.
//!
//! Every cut leaves a measured wire end in its upstream fragment and an
//! initialized wire start in its downstream fragment. A fragment has to be
//! run once for every combination of tomographic initializations and
//! measurement bases at its cut wires.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::partition::{Fragment, Partition, WirePathMap};

/// Role of a fragment-local wire with respect to the cuts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QubitRole {
    /// Neither starts nor ends at a cut.
    Passthrough,
    /// Starts at a cut: needs an injected initialization.
    Rho,
    /// Ends at a cut: needs an injected measurement basis.
    O,
    /// Starts and ends at a cut.
    RhoO,
}

impl QubitRole {
    /// Whether the wire needs an injected initialization.
    #[inline]
    pub fn needs_init(self) -> bool {
        matches!(self, QubitRole::Rho | QubitRole::RhoO)
    }

    /// Whether the wire needs an injected measurement basis.
    #[inline]
    pub fn needs_measurement(self) -> bool {
        matches!(self, QubitRole::O | QubitRole::RhoO)
    }

    fn with_init(self) -> Self {
        match self {
            QubitRole::Passthrough | QubitRole::Rho => QubitRole::Rho,
            QubitRole::O | QubitRole::RhoO => QubitRole::RhoO,
        }
    }

    fn with_measurement(self) -> Self {
        match self {
            QubitRole::Passthrough | QubitRole::O => QubitRole::O,
            QubitRole::Rho | QubitRole::RhoO => QubitRole::RhoO,
        }
    }
}

/// Initialization state injected at the start of a Rho wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitState {
    /// |0>
    Zero,
    /// |1>
    One,
    /// |+>
    Plus,
    /// |->
    Minus,
    /// |+i>
    PlusI,
    /// |-i>
    MinusI,
}

impl InitState {
    /// All six states.
    pub const ALL: [InitState; 6] = [
        InitState::Zero,
        InitState::One,
        InitState::Plus,
        InitState::Minus,
        InitState::PlusI,
        InitState::MinusI,
    ];

    /// Lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            InitState::Zero => "zero",
            InitState::One => "one",
            InitState::Plus => "plus",
            InitState::Minus => "minus",
            InitState::PlusI => "plus_i",
            InitState::MinusI => "minus_i",
        }
    }
}

impl fmt::Display for InitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Measurement basis applied at the end of an O wire.
///
/// Z-basis readout is the native computational-basis measurement and is
/// represented by `I`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MeasBasis {
    /// Computational basis.
    I,
    /// X basis.
    X,
    /// Y basis.
    Y,
}

impl MeasBasis {
    /// All three bases.
    pub const ALL: [MeasBasis; 3] = [MeasBasis::I, MeasBasis::X, MeasBasis::Y];
}

impl fmt::Display for MeasBasis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasBasis::I => write!(f, "I"),
            MeasBasis::X => write!(f, "X"),
            MeasBasis::Y => write!(f, "Y"),
        }
    }
}

/// Pauli operator carried by a cut in one reconstruction term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Pauli {
    I,
    X,
    Y,
    Z,
}

impl Pauli {
    /// All four operators, in index order.
    pub const ALL: [Pauli; 4] = [Pauli::I, Pauli::X, Pauli::Y, Pauli::Z];

    /// Operator for a base-4 digit.
    #[inline]
    pub fn from_digit(digit: usize) -> Self {
        Self::ALL[digit & 3]
    }

    /// Signed eigenstate expansion on the downstream side.
    pub fn eigenstates(self) -> [(InitState, f64); 2] {
        match self {
            Pauli::I => [(InitState::Zero, 1.0), (InitState::One, 1.0)],
            Pauli::X => [(InitState::Plus, 1.0), (InitState::Minus, -1.0)],
            Pauli::Y => [(InitState::PlusI, 1.0), (InitState::MinusI, -1.0)],
            Pauli::Z => [(InitState::Zero, 1.0), (InitState::One, -1.0)],
        }
    }

    /// Measurement basis on the upstream side.
    pub fn measurement_basis(self) -> MeasBasis {
        match self {
            Pauli::I | Pauli::Z => MeasBasis::I,
            Pauli::X => MeasBasis::X,
            Pauli::Y => MeasBasis::Y,
        }
    }

    /// Whether the upstream outcome contributes a `(-1)^bit` factor.
    #[inline]
    pub fn is_parity(self) -> bool {
        self != Pauli::I
    }
}

/// Initializations and measurement bases for one run of a fragment.
///
/// Both lists are sorted by local wire, so equal assignments compare and
/// hash equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BasisAssignment {
    /// Initialization state per Rho wire.
    pub inits: Vec<(u32, InitState)>,
    /// Measurement basis per O wire.
    pub meas: Vec<(u32, MeasBasis)>,
}

impl BasisAssignment {
    /// Create an assignment, sorting both lists by local wire.
    pub fn new(mut inits: Vec<(u32, InitState)>, mut meas: Vec<(u32, MeasBasis)>) -> Self {
        inits.sort_by_key(|(wire, _)| *wire);
        meas.sort_by_key(|(wire, _)| *wire);
        Self { inits, meas }
    }

    /// Whether the assignment is empty (a fragment without cut wires).
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inits.is_empty() && self.meas.is_empty()
    }

    /// Initialization of a local wire, if it has one.
    pub fn init(&self, local: u32) -> Option<InitState> {
        self.inits
            .binary_search_by_key(&local, |(wire, _)| *wire)
            .ok()
            .map(|i| self.inits[i].1)
    }

    /// Measurement basis of a local wire, if it has one.
    pub fn basis(&self, local: u32) -> Option<MeasBasis> {
        self.meas
            .binary_search_by_key(&local, |(wire, _)| *wire)
            .ok()
            .map(|i| self.meas[i].1)
    }
}

impl fmt::Display for BasisAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "[]");
        }
        write!(f, "[")?;
        let mut first = true;
        for (wire, state) in &self.inits {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "q{wire}<-{state}")?;
            first = false;
        }
        for (wire, basis) in &self.meas {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "q{wire}->{basis}")?;
            first = false;
        }
        write!(f, "]")
    }
}

/// One execution request: a fragment under one boundary assignment.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FragmentInstance {
    /// Fragment index.
    pub fragment: usize,
    /// Boundary assignment.
    pub assignment: BasisAssignment,
}

/// Determine the role of every local wire of `fragment`.
///
/// A local wire is Rho when it is not the first hop of its original wire's
/// path, and O when it is not the last.
#[allow(clippy::cast_possible_truncation)]
pub fn qubit_roles(fragment: &Fragment, paths: &WirePathMap) -> Vec<QubitRole> {
    let mut roles = vec![QubitRole::Passthrough; fragment.num_wires()];
    for path in paths.paths() {
        let last = path.hops.len().saturating_sub(1);
        for (position, hop) in path.hops.iter().enumerate() {
            if hop.fragment != fragment.index {
                continue;
            }
            let role = &mut roles[hop.local as usize];
            if position > 0 {
                *role = role.with_init();
            }
            if position < last {
                *role = role.with_measurement();
            }
        }
    }
    roles
}

/// Enumerate all boundary assignments of one fragment.
///
/// Produces `6^|Rho| * 3^|O|` instances; a fragment without cut wires gets
/// exactly one instance with an empty assignment.
#[allow(clippy::cast_possible_truncation)]
pub fn enumerate_instances(fragment: &Fragment, paths: &WirePathMap) -> Vec<FragmentInstance> {
    let roles = qubit_roles(fragment, paths);
    let rho: Vec<u32> = (0..roles.len() as u32)
        .filter(|&w| roles[w as usize].needs_init())
        .collect();
    let o: Vec<u32> = (0..roles.len() as u32)
        .filter(|&w| roles[w as usize].needs_measurement())
        .collect();

    let mut assignments = vec![BasisAssignment::default()];
    for &wire in &rho {
        assignments = assignments
            .into_iter()
            .flat_map(|a| {
                InitState::ALL.into_iter().map(move |state| {
                    let mut next = a.clone();
                    next.inits.push((wire, state));
                    next
                })
            })
            .collect();
    }
    for &wire in &o {
        assignments = assignments
            .into_iter()
            .flat_map(|a| {
                MeasBasis::ALL.into_iter().map(move |basis| {
                    let mut next = a.clone();
                    next.meas.push((wire, basis));
                    next
                })
            })
            .collect();
    }

    debug!(
        "Fragment {}: {} rho, {} O wire(s), {} instance(s)",
        fragment.index,
        rho.len(),
        o.len(),
        assignments.len()
    );

    assignments
        .into_iter()
        .map(|assignment| FragmentInstance {
            fragment: fragment.index,
            assignment,
        })
        .collect()
}

/// Enumerate the instances of every fragment of a partition.
pub fn enumerate_all(partition: &Partition) -> Vec<FragmentInstance> {
    partition
        .fragments
        .iter()
        .flat_map(|fragment| enumerate_instances(fragment, &partition.paths))
        .collect()
}
