//! Deferred optimizer and scheduler factories
//!
//! Optimizer and scheduler nodes are composed as partial configurations: the
//! parameter count and initial learning rate are only known once the model
//! exists, so instantiation yields factories awaiting those arguments.

use ndarray::Array1;

/// Deferred optimizer builder produced by partial instantiation.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimizerFactory {
    pub target: String,
    pub lr: f64,
    pub betas: (f64, f64),
    pub eps: f64,
    pub weight_decay: f64,
}

impl OptimizerFactory {
    /// Complete construction with the model's trainable parameter count.
    pub fn build(&self, param_count: usize) -> Optimizer {
        let kind = if self.target.ends_with("adam") || self.target.ends_with("adamw") {
            OptimizerKind::Adam {
                m: Array1::zeros(param_count),
                v: Array1::zeros(param_count),
                t: 0,
            }
        } else {
            OptimizerKind::Sgd
        };
        Optimizer {
            lr: self.lr,
            betas: self.betas,
            eps: self.eps,
            weight_decay: self.weight_decay,
            kind,
        }
    }
}

#[derive(Debug, Clone)]
enum OptimizerKind {
    Sgd,
    Adam {
        m: Array1<f64>,
        v: Array1<f64>,
        t: u32,
    },
}

/// A ready optimizer over a flat parameter vector.
#[derive(Debug, Clone)]
pub struct Optimizer {
    pub lr: f64,
    betas: (f64, f64),
    eps: f64,
    weight_decay: f64,
    kind: OptimizerKind,
}

impl Optimizer {
    /// Apply one update step in place.
    pub fn step(&mut self, params: &mut [f32], grads: &[f32]) {
        debug_assert_eq!(params.len(), grads.len());
        match &mut self.kind {
            OptimizerKind::Sgd => {
                for (p, g) in params.iter_mut().zip(grads) {
                    let update = f64::from(*g) + self.weight_decay * f64::from(*p);
                    *p -= (self.lr * update) as f32;
                }
            }
            OptimizerKind::Adam { m, v, t } => {
                *t += 1;
                let (b1, b2) = self.betas;
                let correction1 = 1.0 - b1.powi(*t as i32);
                let correction2 = 1.0 - b2.powi(*t as i32);
                for (i, (p, g)) in params.iter_mut().zip(grads).enumerate() {
                    let grad = f64::from(*g) + self.weight_decay * f64::from(*p);
                    m[i] = b1 * m[i] + (1.0 - b1) * grad;
                    v[i] = b2 * v[i] + (1.0 - b2) * grad * grad;
                    let m_hat = m[i] / correction1;
                    let v_hat = v[i] / correction2;
                    *p -= (self.lr * m_hat / (v_hat.sqrt() + self.eps)) as f32;
                }
            }
        }
    }
}

/// Deferred scheduler builder produced by partial instantiation.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerFactory {
    pub target: String,
    pub mode: String,
    pub factor: f64,
    pub patience: usize,
    pub monitor: String,
    pub interval: String,
    pub frequency: usize,
}

impl SchedulerFactory {
    /// Complete construction with the optimizer's initial learning rate.
    pub fn build(&self, initial_lr: f64) -> PlateauScheduler {
        PlateauScheduler {
            mode_max: self.mode == "max",
            factor: self.factor,
            patience: self.patience,
            lr: initial_lr,
            best: None,
            stale_epochs: 0,
        }
    }
}

/// Reduce-on-plateau learning-rate schedule.
#[derive(Debug, Clone)]
pub struct PlateauScheduler {
    mode_max: bool,
    factor: f64,
    patience: usize,
    lr: f64,
    best: Option<f64>,
    stale_epochs: usize,
}

impl PlateauScheduler {
    pub fn lr(&self) -> f64 {
        self.lr
    }

    /// Feed the monitored metric for one epoch; returns the lr to use next.
    pub fn step(&mut self, metric: f64) -> f64 {
        let improved = match self.best {
            None => true,
            Some(best) => {
                if self.mode_max {
                    metric > best
                } else {
                    metric < best
                }
            }
        };
        if improved {
            self.best = Some(metric);
            self.stale_epochs = 0;
        } else {
            self.stale_epochs += 1;
            if self.stale_epochs > self.patience {
                self.lr *= self.factor;
                self.stale_epochs = 0;
            }
        }
        self.lr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn adam_factory() -> OptimizerFactory {
        OptimizerFactory {
            target: "torch.optim.adam".to_string(),
            lr: 0.1,
            betas: (0.9, 0.999),
            eps: 1e-8,
            weight_decay: 0.0,
        }
    }

    #[test]
    fn test_sgd_step() {
        let factory = OptimizerFactory {
            target: "torch.optim.sgd".to_string(),
            lr: 0.5,
            betas: (0.9, 0.999),
            eps: 1e-8,
            weight_decay: 0.0,
        };
        let mut opt = factory.build(2);
        let mut params = [1.0f32, -1.0];
        opt.step(&mut params, &[0.2, -0.2]);
        assert_abs_diff_eq!(params[0], 0.9, epsilon = 1e-6);
        assert_abs_diff_eq!(params[1], -0.9, epsilon = 1e-6);
    }

    #[test]
    fn test_adam_moves_against_gradient() {
        let mut opt = adam_factory().build(1);
        let mut params = [0.0f32];
        for _ in 0..5 {
            opt.step(&mut params, &[1.0]);
        }
        assert!(params[0] < 0.0);
    }

    #[test]
    fn test_weight_decay_shrinks_params() {
        let factory = OptimizerFactory {
            target: "torch.optim.sgd".to_string(),
            lr: 0.1,
            betas: (0.9, 0.999),
            eps: 1e-8,
            weight_decay: 0.5,
        };
        let mut opt = factory.build(1);
        let mut params = [1.0f32];
        opt.step(&mut params, &[0.0]);
        assert!(params[0] < 1.0);
    }

    #[test]
    fn test_plateau_scheduler_reduces_after_patience() {
        let factory = SchedulerFactory {
            target: "plateau".to_string(),
            mode: "max".to_string(),
            factor: 0.1,
            patience: 1,
            monitor: "validation_f1_score".to_string(),
            interval: "epoch".to_string(),
            frequency: 1,
        };
        let mut sched = factory.build(1.0);
        assert_abs_diff_eq!(sched.step(0.5), 1.0); // first value becomes best
        assert_abs_diff_eq!(sched.step(0.4), 1.0); // stale 1 <= patience
        assert_abs_diff_eq!(sched.step(0.4), 0.1); // stale 2 > patience
    }

    #[test]
    fn test_plateau_scheduler_min_mode() {
        let factory = SchedulerFactory {
            target: "plateau".to_string(),
            mode: "min".to_string(),
            factor: 0.5,
            patience: 0,
            monitor: "loss".to_string(),
            interval: "epoch".to_string(),
            frequency: 1,
        };
        let mut sched = factory.build(1.0);
        sched.step(1.0);
        assert_abs_diff_eq!(sched.step(0.5), 1.0); // improved
        assert_abs_diff_eq!(sched.step(0.6), 0.5); // regressed, patience 0
    }
}
