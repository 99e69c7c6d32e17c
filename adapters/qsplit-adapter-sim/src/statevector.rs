//! Statevector simulation engine.

use num_complex::Complex64;
use rand::Rng;
use std::f64::consts::PI;

use qsplit_cut::{InitState, MeasBasis};
use qsplit_ir::Gate;

use crate::error::{SimError, SimResult};

/// A statevector over `n` wires, indexed little-endian.
pub struct Statevector {
    /// The state amplitudes (2^n complex numbers).
    amplitudes: Vec<Complex64>,
    /// Number of wires.
    num_qubits: usize,
}

impl Statevector {
    /// Create a new statevector initialized to |0...0⟩.
    pub fn new(num_qubits: usize) -> Self {
        let size = 1 << num_qubits;
        let mut amplitudes = vec![Complex64::new(0.0, 0.0); size];
        amplitudes[0] = Complex64::new(1.0, 0.0);
        Self {
            amplitudes,
            num_qubits,
        }
    }

    /// Get the number of wires.
    pub fn num_qubits(&self) -> usize {
        self.num_qubits
    }

    /// Apply `gate` to the wires at `qubits`.
    pub fn apply(&mut self, gate: &Gate, qubits: &[usize]) -> SimResult<()> {
        match gate {
            // Single-qubit gates
            Gate::I => {}
            Gate::X => self.apply_x(qubits[0]),
            Gate::Y => self.apply_y(qubits[0]),
            Gate::Z => self.apply_z(qubits[0]),
            Gate::H => self.apply_h(qubits[0]),
            Gate::S => self.apply_phase(qubits[0], PI / 2.0),
            Gate::Sdg => self.apply_phase(qubits[0], -PI / 2.0),
            Gate::T => self.apply_phase(qubits[0], PI / 4.0),
            Gate::Tdg => self.apply_phase(qubits[0], -PI / 4.0),
            Gate::SX => self.apply_rx(qubits[0], PI / 2.0),
            Gate::SXdg => self.apply_rx(qubits[0], -PI / 2.0),
            Gate::Rx(theta) => self.apply_rx(qubits[0], *theta),
            Gate::Ry(theta) => self.apply_ry(qubits[0], *theta),
            Gate::Rz(theta) => self.apply_rz(qubits[0], *theta),
            Gate::P(theta) => self.apply_phase(qubits[0], *theta),
            Gate::U(theta, phi, lambda) => self.apply_u(qubits[0], *theta, *phi, *lambda),

            // Two-qubit gates
            Gate::CX => self.apply_cx(qubits[0], qubits[1]),
            Gate::CY => self.apply_cy(qubits[0], qubits[1]),
            Gate::CZ => self.apply_cz(qubits[0], qubits[1]),
            Gate::CH => self.apply_ch(qubits[0], qubits[1]),
            Gate::Swap => self.apply_swap(qubits[0], qubits[1]),
            Gate::ISwap => self.apply_iswap(qubits[0], qubits[1]),
            Gate::CRz(theta) => self.apply_crz(qubits[0], qubits[1], *theta),
            Gate::CP(theta) => self.apply_cp(qubits[0], qubits[1], *theta),
            Gate::RZZ(theta) => self.apply_rzz(qubits[0], qubits[1], *theta),

            // Three-qubit gates
            Gate::CCX => self.apply_ccx(qubits[0], qubits[1], qubits[2]),
            Gate::CSwap => self.apply_cswap(qubits[0], qubits[1], qubits[2]),

            Gate::Opaque { name, .. } => return Err(SimError::UnsupportedGate(name.clone())),
        }
        Ok(())
    }

    /// Rotate `|0⟩` on `qubit` into `state`.
    pub fn prepare(&mut self, qubit: usize, state: InitState) {
        match state {
            InitState::Zero => {}
            InitState::One => self.apply_x(qubit),
            InitState::Plus => self.apply_h(qubit),
            InitState::Minus => {
                self.apply_x(qubit);
                self.apply_h(qubit);
            }
            InitState::PlusI => {
                self.apply_h(qubit);
                self.apply_phase(qubit, PI / 2.0);
            }
            InitState::MinusI => {
                self.apply_x(qubit);
                self.apply_h(qubit);
                self.apply_phase(qubit, PI / 2.0);
            }
        }
    }

    /// Rotate `qubit` so that a computational-basis readout measures
    /// `basis`. Outcome 0 is the +1 eigenvalue.
    pub fn rotate_to_basis(&mut self, qubit: usize, basis: MeasBasis) {
        match basis {
            MeasBasis::I => {}
            MeasBasis::X => self.apply_h(qubit),
            MeasBasis::Y => {
                self.apply_phase(qubit, -PI / 2.0);
                self.apply_h(qubit);
            }
        }
    }

    /// Outcome probabilities, indexed like the amplitudes.
    pub fn probabilities(&self) -> Vec<f64> {
        self.amplitudes.iter().map(Complex64::norm_sqr).collect()
    }

    // =========================================================================
    // Single-qubit gate implementations
    // =========================================================================

    fn apply_x(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                self.amplitudes.swap(i, j);
            }
        }
    }

    fn apply_y(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        let i_val = Complex64::new(0.0, 1.0);
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let tmp = self.amplitudes[i];
                self.amplitudes[i] = -i_val * self.amplitudes[j];
                self.amplitudes[j] = i_val * tmp;
            }
        }
    }

    fn apply_z(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        for i in 0..(1 << self.num_qubits) {
            if i & mask != 0 {
                self.amplitudes[i] = -self.amplitudes[i];
            }
        }
    }

    fn apply_h(&mut self, qubit: usize) {
        let mask = 1 << qubit;
        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = sqrt2_inv * (a + b);
                self.amplitudes[j] = sqrt2_inv * (a - b);
            }
        }
    }

    fn apply_phase(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let phase = Complex64::from_polar(1.0, theta);
        for i in 0..(1 << self.num_qubits) {
            if i & mask != 0 {
                self.amplitudes[i] *= phase;
            }
        }
    }

    fn apply_rx(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        let neg_i_s = Complex64::new(0.0, -s);
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = c * a + neg_i_s * b;
                self.amplitudes[j] = neg_i_s * a + c * b;
            }
        }
    }

    fn apply_ry(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = c * a - s * b;
                self.amplitudes[j] = s * a + c * b;
            }
        }
    }

    fn apply_rz(&mut self, qubit: usize, theta: f64) {
        let mask = 1 << qubit;
        let phase_0 = Complex64::from_polar(1.0, -theta / 2.0);
        let phase_1 = Complex64::from_polar(1.0, theta / 2.0);
        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                self.amplitudes[i] *= phase_0;
            } else {
                self.amplitudes[i] *= phase_1;
            }
        }
    }

    fn apply_u(&mut self, qubit: usize, theta: f64, phi: f64, lambda: f64) {
        let mask = 1 << qubit;
        let c = (theta / 2.0).cos();
        let s = (theta / 2.0).sin();
        let e_il = Complex64::from_polar(1.0, lambda);
        let e_ip = Complex64::from_polar(1.0, phi);
        let e_ipl = Complex64::from_polar(1.0, phi + lambda);

        for i in 0..(1 << self.num_qubits) {
            if i & mask == 0 {
                let j = i | mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = c * a - e_il * s * b;
                self.amplitudes[j] = e_ip * s * a + e_ipl * c * b;
            }
        }
    }

    // =========================================================================
    // Two-qubit gate implementations
    // =========================================================================

    fn apply_cx(&mut self, control: usize, target: usize) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask != 0) && (i & tgt_mask == 0) {
                let j = i | tgt_mask;
                self.amplitudes.swap(i, j);
            }
        }
    }

    fn apply_cy(&mut self, control: usize, target: usize) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        let i_val = Complex64::new(0.0, 1.0);
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask != 0) && (i & tgt_mask == 0) {
                let j = i | tgt_mask;
                let tmp = self.amplitudes[i];
                self.amplitudes[i] = -i_val * self.amplitudes[j];
                self.amplitudes[j] = i_val * tmp;
            }
        }
    }

    fn apply_cz(&mut self, control: usize, target: usize) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask != 0) && (i & tgt_mask != 0) {
                self.amplitudes[i] = -self.amplitudes[i];
            }
        }
    }

    fn apply_ch(&mut self, control: usize, target: usize) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask != 0) && (i & tgt_mask == 0) {
                let j = i | tgt_mask;
                let a = self.amplitudes[i];
                let b = self.amplitudes[j];
                self.amplitudes[i] = sqrt2_inv * (a + b);
                self.amplitudes[j] = sqrt2_inv * (a - b);
            }
        }
    }

    fn apply_swap(&mut self, q1: usize, q2: usize) {
        let mask1 = 1 << q1;
        let mask2 = 1 << q2;
        for i in 0..(1 << self.num_qubits) {
            let b1 = (i & mask1) != 0;
            let b2 = (i & mask2) != 0;
            if b1 && !b2 {
                let j = (i & !mask1) | mask2;
                self.amplitudes.swap(i, j);
            }
        }
    }

    fn apply_iswap(&mut self, q1: usize, q2: usize) {
        let mask1 = 1 << q1;
        let mask2 = 1 << q2;
        let i_val = Complex64::new(0.0, 1.0);
        for i in 0..(1 << self.num_qubits) {
            let b1 = (i & mask1) != 0;
            let b2 = (i & mask2) != 0;
            if b1 && !b2 {
                let j = (i & !mask1) | mask2;
                let tmp = self.amplitudes[i];
                self.amplitudes[i] = i_val * self.amplitudes[j];
                self.amplitudes[j] = i_val * tmp;
            }
        }
    }

    fn apply_crz(&mut self, control: usize, target: usize, theta: f64) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        let phase_0 = Complex64::from_polar(1.0, -theta / 2.0);
        let phase_1 = Complex64::from_polar(1.0, theta / 2.0);
        for i in 0..(1 << self.num_qubits) {
            if i & ctrl_mask != 0 {
                if i & tgt_mask == 0 {
                    self.amplitudes[i] *= phase_0;
                } else {
                    self.amplitudes[i] *= phase_1;
                }
            }
        }
    }

    fn apply_cp(&mut self, control: usize, target: usize, theta: f64) {
        let ctrl_mask = 1 << control;
        let tgt_mask = 1 << target;
        let phase = Complex64::from_polar(1.0, theta);
        for i in 0..(1 << self.num_qubits) {
            if (i & ctrl_mask != 0) && (i & tgt_mask != 0) {
                self.amplitudes[i] *= phase;
            }
        }
    }

    /// exp(-iθ/2 Z⊗Z)
    fn apply_rzz(&mut self, q1: usize, q2: usize, theta: f64) {
        let mask1 = 1 << q1;
        let mask2 = 1 << q2;
        let even = Complex64::from_polar(1.0, -theta / 2.0);
        let odd = Complex64::from_polar(1.0, theta / 2.0);
        for i in 0..(1 << self.num_qubits) {
            let b1 = (i & mask1) != 0;
            let b2 = (i & mask2) != 0;
            if b1 == b2 {
                self.amplitudes[i] *= even;
            } else {
                self.amplitudes[i] *= odd;
            }
        }
    }

    // =========================================================================
    // Three-qubit gate implementations
    // =========================================================================

    fn apply_ccx(&mut self, c1: usize, c2: usize, target: usize) {
        let c1_mask = 1 << c1;
        let c2_mask = 1 << c2;
        let tgt_mask = 1 << target;
        for i in 0..(1 << self.num_qubits) {
            if (i & c1_mask != 0) && (i & c2_mask != 0) && (i & tgt_mask == 0) {
                let j = i | tgt_mask;
                self.amplitudes.swap(i, j);
            }
        }
    }

    fn apply_cswap(&mut self, control: usize, t1: usize, t2: usize) {
        let ctrl_mask = 1 << control;
        let t1_mask = 1 << t1;
        let t2_mask = 1 << t2;
        for i in 0..(1 << self.num_qubits) {
            if i & ctrl_mask != 0 {
                let b1 = (i & t1_mask) != 0;
                let b2 = (i & t2_mask) != 0;
                if b1 && !b2 {
                    let j = (i & !t1_mask) | t2_mask;
                    self.amplitudes.swap(i, j);
                }
            }
        }
    }
}

/// Draw one outcome from `probs` by inverse-CDF sampling.
pub(crate) fn sample_index<R: Rng>(probs: &[f64], rng: &mut R) -> usize {
    let r: f64 = rng.r#gen();
    let mut cumulative = 0.0;
    for (i, p) in probs.iter().enumerate() {
        cumulative += p;
        if r < cumulative {
            return i;
        }
    }
    // rounding left the total slightly below 1
    probs.iter().rposition(|p| *p > 0.0).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn approx_eq(a: Complex64, b: Complex64) -> bool {
        (a - b).norm() < 1e-10
    }

    /// ⟨σ⟩ on a single wire, read off after rotating into `basis`.
    fn expectation(state: InitState, basis: MeasBasis) -> f64 {
        let mut sv = Statevector::new(1);
        sv.prepare(0, state);
        sv.rotate_to_basis(0, basis);
        let p = sv.probabilities();
        p[0] - p[1]
    }

    #[test]
    fn test_initial_state() {
        let sv = Statevector::new(2);
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(1.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[2], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[3], Complex64::new(0.0, 0.0)));
    }

    #[test]
    fn test_bell_state() {
        let mut sv = Statevector::new(2);
        sv.apply(&Gate::H, &[0]).unwrap();
        sv.apply(&Gate::CX, &[0, 1]).unwrap();

        let sqrt2_inv = 1.0 / 2.0_f64.sqrt();
        assert!(approx_eq(sv.amplitudes[0], Complex64::new(sqrt2_inv, 0.0)));
        assert!(approx_eq(sv.amplitudes[1], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[2], Complex64::new(0.0, 0.0)));
        assert!(approx_eq(sv.amplitudes[3], Complex64::new(sqrt2_inv, 0.0)));
    }

    #[test]
    fn test_little_endian_order() {
        let mut sv = Statevector::new(3);
        sv.apply(&Gate::X, &[1]).unwrap();
        let probs = sv.probabilities();
        assert!((probs[0b010] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_prepared_states_are_pauli_eigenstates() {
        assert!((expectation(InitState::Zero, MeasBasis::I) - 1.0).abs() < 1e-12);
        assert!((expectation(InitState::One, MeasBasis::I) + 1.0).abs() < 1e-12);
        assert!((expectation(InitState::Plus, MeasBasis::X) - 1.0).abs() < 1e-12);
        assert!((expectation(InitState::Minus, MeasBasis::X) + 1.0).abs() < 1e-12);
        assert!((expectation(InitState::PlusI, MeasBasis::Y) - 1.0).abs() < 1e-12);
        assert!((expectation(InitState::MinusI, MeasBasis::Y) + 1.0).abs() < 1e-12);
        // unbiased in the other bases
        assert!(expectation(InitState::Plus, MeasBasis::Y).abs() < 1e-12);
        assert!(expectation(InitState::PlusI, MeasBasis::X).abs() < 1e-12);
        assert!(expectation(InitState::PlusI, MeasBasis::I).abs() < 1e-12);
    }

    #[test]
    fn test_rzz_matches_cx_rz_cx() {
        let theta = 0.77;
        let mut a = Statevector::new(2);
        let mut b = Statevector::new(2);
        for sv in [&mut a, &mut b] {
            sv.apply(&Gate::H, &[0]).unwrap();
            sv.apply(&Gate::Ry(0.4), &[1]).unwrap();
        }
        a.apply(&Gate::RZZ(theta), &[0, 1]).unwrap();
        b.apply(&Gate::CX, &[0, 1]).unwrap();
        b.apply(&Gate::Rz(theta), &[1]).unwrap();
        b.apply(&Gate::CX, &[0, 1]).unwrap();
        for (x, y) in a.amplitudes.iter().zip(&b.amplitudes) {
            assert!(approx_eq(*x, *y));
        }
    }

    #[test]
    fn test_opaque_gate_rejected() {
        let mut sv = Statevector::new(1);
        let gate = Gate::Opaque {
            name: "oracle".into(),
            num_wires: 1,
        };
        assert!(matches!(
            sv.apply(&gate, &[0]),
            Err(SimError::UnsupportedGate(name)) if name == "oracle"
        ));
    }

    #[test]
    fn test_sample_deterministic() {
        let mut sv = Statevector::new(1);
        sv.apply(&Gate::X, &[0]).unwrap();
        let probs = sv.probabilities();

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..100 {
            assert_eq!(sample_index(&probs, &mut rng), 1);
        }
    }
}
