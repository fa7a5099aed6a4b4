//! The compiled artifact the VM executes.
//!
//! A [`Program`] is immutable once built. Building it scans every section
//! once to fill the jump table and checks that every jump lands on a label in
//! its own section.

use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use quill_foundation::{Error, Result, ScriptFunction, Value};

use crate::opcode::{CodeSection, Instruction, LabelId, Opcode};

/// Name of code section 0.
pub const SCRIPT_SECTION: &str = "<script>";

/// Compiled bytecode with its constant pool and function table.
#[derive(Debug)]
pub struct Program {
    sections: Vec<CodeSection>,
    constants: Vec<Value>,
    functions: Vec<Rc<ScriptFunction>>,
    classes: HashMap<String, Vec<usize>>,
    jump_table: HashMap<LabelId, usize>,
    function_index: HashMap<String, usize>,
}

impl Program {
    /// Assembles a program and builds its lookup tables.
    ///
    /// `classes` maps each declared class to the function-table indices of its
    /// methods.
    ///
    /// # Errors
    /// Returns an invariant violation if section 0 is missing, a label is
    /// defined twice, or a jump targets a label outside its own section.
    pub fn new(
        sections: Vec<CodeSection>,
        constants: Vec<Value>,
        functions: Vec<ScriptFunction>,
        classes: HashMap<String, Vec<usize>>,
    ) -> Result<Self> {
        if sections.is_empty() {
            return Err(Error::invariant("program has no script section"));
        }

        let mut jump_table = HashMap::new();
        let mut label_section = HashMap::new();
        for (section_idx, section) in sections.iter().enumerate() {
            for (pc, instr) in section.code.iter().enumerate() {
                if let Opcode::Label(label) = instr.op {
                    if jump_table.insert(label, pc).is_some() {
                        return Err(Error::invariant(format!("label L{label} defined twice")));
                    }
                    label_section.insert(label, section_idx);
                }
            }
        }

        for (section_idx, section) in sections.iter().enumerate() {
            for instr in &section.code {
                let targets = instr
                    .op
                    .jump_target()
                    .into_iter()
                    .chain(match instr.op {
                        Opcode::Try { finally, .. } => finally,
                        _ => None,
                    });
                for label in targets {
                    if label_section.get(&label) != Some(&section_idx) {
                        return Err(Error::invariant(format!(
                            "`{}` in {} targets unknown label L{label}",
                            instr.op, section.name
                        )));
                    }
                }
            }
        }

        let function_index = functions
            .iter()
            .enumerate()
            .map(|(idx, f)| (f.name.clone(), idx))
            .collect();

        Ok(Self {
            sections,
            constants,
            functions: functions.into_iter().map(Rc::new).collect(),
            classes,
            jump_table,
            function_index,
        })
    }

    /// Returns all code sections; index 0 is the script.
    #[must_use]
    pub fn sections(&self) -> &[CodeSection] {
        &self.sections
    }

    /// Returns one code section.
    #[must_use]
    pub fn section(&self, idx: usize) -> Option<&CodeSection> {
        self.sections.get(idx)
    }

    /// Returns the instruction at a section and pc.
    #[must_use]
    pub fn instruction(&self, section: usize, pc: usize) -> Option<&Instruction> {
        self.sections.get(section).and_then(|s| s.code.get(pc))
    }

    /// Returns the constant pool.
    #[must_use]
    pub fn constants(&self) -> &[Value] {
        &self.constants
    }

    /// Returns one constant.
    #[must_use]
    pub fn constant(&self, idx: u32) -> Option<&Value> {
        self.constants.get(idx as usize)
    }

    /// Returns the function table.
    #[must_use]
    pub fn functions(&self) -> &[Rc<ScriptFunction>] {
        &self.functions
    }

    /// Looks a function up by name.
    #[must_use]
    pub fn function(&self, name: &str) -> Option<&Rc<ScriptFunction>> {
        self.function_index
            .get(name)
            .and_then(|&idx| self.functions.get(idx))
    }

    /// Returns the methods of a declared class, or `None` if undeclared.
    pub fn class_methods(&self, class: &str) -> Option<impl Iterator<Item = &Rc<ScriptFunction>>> {
        self.classes
            .get(class)
            .map(|methods| methods.iter().filter_map(|&idx| self.functions.get(idx)))
    }

    /// Resolves a label to its instruction index.
    #[must_use]
    pub fn jump_target(&self, label: LabelId) -> Option<usize> {
        self.jump_table.get(&label).copied()
    }

    /// Renders every section as a listing.
    #[must_use]
    pub fn disassemble(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "constants:")?;
        for (idx, constant) in self.constants.iter().enumerate() {
            writeln!(f, "{idx:>5} {constant:?}")?;
        }
        for section in &self.sections {
            write!(f, "{section}")?;
        }
        Ok(())
    }
}
