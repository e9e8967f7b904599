//! Exchange document handed to the AST generator.
//!
//! The document lists the parameter context, one iteration domain per
//! statement and, when every statement is scheduled, one scattering
//! relation per statement. Matrices use the polylib layout of
//! [`ConstraintSystem::write_polylib`](crate::polyhedral::ConstraintSystem::write_polylib).

use crate::ir::pir::{PolyProgram, StmtId};
use crate::polyhedral::{AffineMap, IntegerSet};
use crate::VERSION;
use log::debug;
use std::fmt;

/// A statement domain as seen by the generator.
#[derive(Debug, Clone)]
pub struct InputDomain {
    pub id: StmtId,
    pub text: String,
    pub domain: IntegerSet,
}

/// Scattering function of one statement.
#[derive(Debug, Clone)]
pub struct Scattering {
    pub id: StmtId,
    pub map: AffineMap,
}

/// Structured form of the generator's exchange document.
#[derive(Debug, Clone)]
pub struct GeneratorInput {
    /// Parameter validity context intersected with the code generation context
    pub context: IntegerSet,
    pub parameters: Vec<String>,
    pub domains: Vec<InputDomain>,
    /// Present only when every statement carries a schedule
    pub scatterings: Option<Vec<Scattering>>,
    /// `t1..tN`
    pub scattering_names: Vec<String>,
}

impl GeneratorInput {
    /// Build the generator input for a program.
    pub fn from_program(prog: &PolyProgram) -> Self {
        debug!("Building generator input for '{}'", prog.name);

        let context = prog.param_context.intersect(&prog.codegen_context);

        let domains = prog.statements.iter()
            .map(|s| InputDomain {
                id: s.id,
                text: s.text.clone(),
                domain: s.domain.clone(),
            })
            .collect();

        let scatterings: Option<Vec<Scattering>> = if prog.statements.is_empty() {
            None
        } else {
            prog.statements.iter()
                .map(|s| s.schedule.clone().map(|map| Scattering { id: s.id, map }))
                .collect()
        };

        let n_rows = scatterings.as_ref()
            .and_then(|sc| sc.first())
            .map_or(0, |s| s.map.n_out());
        let scattering_names = (1..=n_rows).map(|k| format!("t{}", k)).collect();

        Self {
            context,
            parameters: prog.parameters.clone(),
            domains,
            scatterings,
            scattering_names,
        }
    }

    pub fn num_statements(&self) -> usize {
        self.domains.len()
    }

    /// Number of scattering dimensions (0 without scatterings).
    pub fn num_scattering_dims(&self) -> usize {
        self.scattering_names.len()
    }

    /// Render the exchange document into a string.
    pub fn to_document(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for GeneratorInput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "# Generator input produced by polyemit {}", VERSION)?;
        writeln!(f, "# language: C")?;
        writeln!(f, "c")?;
        writeln!(f)?;

        // Context: conditions on the parameters
        self.context.constraints.write_polylib(f)?;
        writeln!(f)?;
        writeln!(f, "1")?;
        for p in &self.parameters {
            write!(f, "{} ", p)?;
        }
        writeln!(f)?;
        writeln!(f)?;

        writeln!(f, "# Number of statements")?;
        writeln!(f, "{}", self.domains.len())?;
        writeln!(f)?;
        for d in &self.domains {
            writeln!(f, "# {} ({})", d.id, d.text)?;
            d.domain.constraints.write_polylib(f)?;
            writeln!(f, "0 0 0")?;
            writeln!(f)?;
        }

        writeln!(f, "# the generator chooses the iterator names")?;
        writeln!(f, "0")?;
        writeln!(f)?;

        writeln!(f, "# Number of scattering functions")?;
        match &self.scatterings {
            Some(scatterings) => {
                writeln!(f, "{}", scatterings.len())?;
                writeln!(f)?;
                for s in scatterings {
                    writeln!(f, "# T({})", s.id)?;
                    s.map.to_relation().constraints.write_polylib(f)?;
                    writeln!(f)?;
                }
                writeln!(f, "# scattering dimension names")?;
                writeln!(f, "{}", self.scattering_names.len())?;
                for name in &self.scattering_names {
                    write!(f, "{} ", name)?;
                }
                writeln!(f)
            }
            None => {
                writeln!(f, "0")?;
                writeln!(f)
            }
        }
    }
}
