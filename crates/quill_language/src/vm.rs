//! Stack-based virtual machine for Quill bytecode.
//!
//! The VM runs a compiled [`Program`]. Values and control markers share one
//! stack: a `CALL` pushes a [`CallFrame`], `TRY` a [`TryRegion`], `LOOP_START`
//! a [`LoopMarker`]. Thrown values and catchable runtime errors unwind that
//! stack to the nearest try region.
//!
//! # Host Calls
//!
//! [`Vm::call`] runs a script function on behalf of the embedder. Its frame
//! is marked as coming from the host, so the matching `RETURN` hands control
//! back and unwinding never crosses it.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::needless_pass_by_value)]

mod builtins;
pub mod config;
mod frame;
pub mod interop;

pub use config::VmConfig;
pub use frame::{CallFrame, LoopMarker, StackEntry, TryRegion};
pub use interop::NativeRegistry;

use std::fmt;
use std::rc::Rc;

use quill_foundation::environment::THIS;
use quill_foundation::operators::{
    add_values, bit_and, bit_or, div_values, equals, ge_values, gt_values, le_values, lt_values,
    mul_values, pow_values, rem_values, sub_values,
};
use quill_foundation::{
    Arity, Environment, Error, ErrorContext, ErrorKind, HostContext, NativeHandle, ObjectRef,
    ResourceLimit, Result, ScriptFunction, Value,
};
use tracing::{debug, error, info, trace, warn};

use crate::compiler::CONSTRUCTOR;
use crate::opcode::{INDEXER, Instruction, LabelId, Opcode};
use crate::program::Program;
use crate::span::Span;

use builtins::Builtins;

/// Class name given to objects built from record literals.
const RECORD_CLASS: &str = "Object";

/// Execution state of a [`Vm`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VmState {
    /// Constructed or reset; nothing has run.
    Ready,
    /// Executing instructions.
    Running,
    /// Stopped at a breakpoint or statement boundary; can resume.
    Paused,
    /// Reached the end of the script.
    Done,
    /// Stopped on an error; must be reset before running again.
    Error,
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Done => "done",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mode {
    Run,
    Step,
}

/// Why the dispatch loop handed control back.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stop {
    Eof,
    Breakpoint,
    Boundary,
    HostReturn,
}

enum Flow {
    Continue,
    Stop(Stop),
}

/// Stack-based virtual machine.
pub struct Vm {
    /// The program being executed.
    program: Rc<Program>,
    /// Resource limits.
    config: VmConfig,
    /// Values and control markers.
    stack: Vec<StackEntry>,
    /// Section being executed.
    section: usize,
    /// Next instruction in `section`.
    pc: usize,
    /// Current scope.
    env: Environment,
    /// Root scope; replaced on reset.
    global: Environment,
    state: VmState,
    /// Instructions executed since the last reset.
    cycles: u64,
    /// Registered host functions and objects.
    natives: NativeRegistry,
    /// Method tables of the builtin types.
    builtins: Builtins,
    /// Receives `print` output and VM debug lines.
    log_sink: Box<dyn FnMut(&str)>,
    /// The last value that escaped every try region.
    last_exception: Option<Value>,
    /// Nesting depth of [`Vm::call`].
    host_calls: usize,
}

impl Vm {
    /// Creates a VM with the default configuration.
    #[must_use]
    pub fn new(program: Program) -> Self {
        Self::with_config(program, VmConfig::default())
    }

    /// Creates a VM with the given configuration.
    #[must_use]
    pub fn with_config(program: Program, config: VmConfig) -> Self {
        let global = Environment::new();
        let mut natives = NativeRegistry::new();
        builtins::install_globals(&mut natives);
        Self {
            program: Rc::new(program),
            config,
            stack: Vec::with_capacity(256),
            section: 0,
            pc: 0,
            env: global.clone(),
            global,
            state: VmState::Ready,
            cycles: 0,
            natives,
            builtins: Builtins::new(),
            log_sink: Box::new(|line: &str| info!(target: "quill::script", "{line}")),
            last_exception: None,
            host_calls: 0,
        }
    }

    // =========================================================================
    // Embedder API
    // =========================================================================

    /// Runs until the script ends or hits a `debugger` statement.
    ///
    /// # Errors
    /// Returns uncaught exceptions, limit violations and invariant violations.
    /// A VM that stopped on an error returns [`ErrorKind::Halted`] until reset.
    pub fn run(&mut self) -> Result<VmState> {
        self.execute(Mode::Run)
    }

    /// Runs until the next statement boundary.
    ///
    /// # Errors
    /// Same as [`Vm::run`].
    pub fn step(&mut self) -> Result<VmState> {
        self.execute(Mode::Step)
    }

    /// Clears the stack, replaces the global scope and rewinds to the start.
    ///
    /// Registered natives and the log sink are kept.
    pub fn reset(&mut self) {
        self.stack.clear();
        self.global = Environment::new();
        self.env = self.global.clone();
        self.section = 0;
        self.pc = 0;
        self.cycles = 0;
        self.state = VmState::Ready;
        self.last_exception = None;
        self.host_calls = 0;
        debug!("vm reset");
    }

    /// Returns the execution state.
    #[must_use]
    pub const fn state(&self) -> VmState {
        self.state
    }

    /// Calls a script or native function by name and returns its result.
    ///
    /// The VM's position and state are restored afterwards, so a paused
    /// script can be resumed.
    ///
    /// # Errors
    /// Returns an error if the name does not resolve to something callable,
    /// or if the call raises an error it does not catch itself.
    pub fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value> {
        if self.state == VmState::Error {
            return Err(Error::halted());
        }
        let program = Rc::clone(&self.program);
        let callee = self.lookup(&program, name)?;
        debug!(function = name, argc = args.len(), "host call");

        match callee {
            Value::Function(func) => {
                let saved_state = self.state;
                self.state = VmState::Running;
                self.host_calls += 1;
                self.enter_function(&func, None, args, true);
                let outcome = self.dispatch_loop(&program, Mode::Run);
                self.host_calls -= 1;

                match outcome {
                    Ok(Stop::HostReturn) => {
                        self.state = saved_state;
                        self.pop()
                    }
                    Ok(stop) => Err(self.fatal(
                        Error::invariant(format!("host call ended with {stop:?}")),
                        None,
                    )),
                    Err(err) => {
                        if self.state != VmState::Error {
                            self.state = saved_state;
                        }
                        Err(err)
                    }
                }
            }
            Value::Native(handle) if handle.is_callable() => self.call_native(&handle, None, &args),
            other => Err(Error::not_callable(other.value_type())),
        }
    }

    /// Reads a global variable.
    #[must_use]
    pub fn get_global(&self, name: &str) -> Option<Value> {
        self.global.get_local(name)
    }

    /// Defines or overwrites a global variable.
    pub fn define_global(&mut self, name: impl Into<String>, value: Value) {
        self.global.define(name, value);
    }

    /// Registers a host function callable from scripts.
    ///
    /// # Errors
    /// Returns a native error if `name` is empty.
    pub fn register_native_function(
        &mut self,
        name: impl Into<String>,
        arity: Arity,
        func: impl Fn(&mut HostContext<'_>, &[Value]) -> Result<Value> + 'static,
    ) -> Result<()> {
        self.natives.register_function(name, arity, func)
    }

    /// Registers a host object reachable from scripts by name.
    ///
    /// # Errors
    /// Returns a native error if `name` is empty.
    pub fn register_native_object(
        &mut self,
        name: impl Into<String>,
        handle: NativeHandle,
    ) -> Result<()> {
        self.natives.register(name, handle)
    }

    /// Replaces the sink receiving `print` output and VM debug lines.
    pub fn set_log_sink(&mut self, sink: impl FnMut(&str) + 'static) {
        self.log_sink = Box::new(sink);
    }

    /// Returns the number of stack entries, markers included.
    #[must_use]
    pub fn stack_depth(&self) -> usize {
        self.stack.len()
    }

    /// Returns the last value that escaped every try region.
    #[must_use]
    pub fn last_exception(&self) -> Option<&Value> {
        self.last_exception.as_ref()
    }

    /// Returns the instructions executed since the last reset.
    #[must_use]
    pub const fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Returns the program being executed.
    #[must_use]
    pub fn program(&self) -> &Program {
        &self.program
    }

    /// Returns the configuration.
    #[must_use]
    pub const fn config(&self) -> &VmConfig {
        &self.config
    }

    // =========================================================================
    // Dispatch Loop
    // =========================================================================

    fn execute(&mut self, mode: Mode) -> Result<VmState> {
        match self.state {
            VmState::Error => return Err(Error::halted()),
            VmState::Done => return Ok(VmState::Done),
            _ => {}
        }
        self.state = VmState::Running;

        let program = Rc::clone(&self.program);
        match self.dispatch_loop(&program, mode)? {
            Stop::Eof => {
                self.state = VmState::Done;
                debug!(cycles = self.cycles, "script finished");
            }
            Stop::Breakpoint | Stop::Boundary => self.state = VmState::Paused,
            Stop::HostReturn => {
                return Err(self.fatal(
                    Error::invariant("host frame returned outside a host call"),
                    None,
                ));
            }
        }
        Ok(self.state)
    }

    fn dispatch_loop(&mut self, program: &Program, mode: Mode) -> Result<Stop> {
        let mut first = true;
        loop {
            if let Err(err) = self.check_limits() {
                return Err(self.fatal(err, None));
            }

            let Some(instr) = program.instruction(self.section, self.pc) else {
                let err = Error::invariant(format!(
                    "pc {} is outside section {}",
                    self.pc, self.section
                ));
                return Err(self.fatal(err, None));
            };
            if mode == Mode::Step && instr.boundary && !first {
                return Ok(Stop::Boundary);
            }
            first = false;

            self.cycles += 1;
            self.pc += 1;
            trace!(
                section = self.section,
                pc = self.pc - 1,
                op = %instr.op,
                depth = self.stack.len(),
                "dispatch"
            );

            match self.dispatch(program, instr) {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop(stop)) => return Ok(stop),
                Err(err) => self.handle_error(program, err, instr.span)?,
            }
        }
    }

    fn dispatch(&mut self, program: &Program, instr: &Instruction) -> Result<Flow> {
        match &instr.op {
            // === Stack Operations ===
            Opcode::Nop | Opcode::Label(_) => {}
            Opcode::Const(idx) => {
                let value = program
                    .constant(*idx)
                    .cloned()
                    .ok_or_else(|| Error::invariant(format!("constant #{idx} out of range")))?;
                self.push(value);
            }
            Opcode::Dup => {
                let value = self.peek()?.clone();
                self.push(value);
            }
            Opcode::Pop => {
                self.pop()?;
            }

            // === Variables and Properties ===
            Opcode::Fetch {
                name,
                via_object: false,
            } => {
                let value = self.lookup(program, name)?;
                self.push(value);
            }
            Opcode::Fetch {
                name,
                via_object: true,
            } => {
                let key = self.property_key(name)?;
                let target = self.pop()?;
                let value = self.get_property(&target, &key)?;
                self.push(value);
            }
            Opcode::Store {
                name,
                via_object: false,
            } => {
                let value = self.pop()?;
                self.env.assign(name, value)?;
            }
            Opcode::Store {
                name,
                via_object: true,
            } => {
                let key = self.property_key(name)?;
                let target = self.pop()?;
                let value = self.pop()?;
                self.set_property(&target, &key, value)?;
            }
            Opcode::Declare(name) => self.env.define(name.clone(), Value::Undefined),

            // === Arithmetic ===
            Opcode::Add => self.binary_op(add_values)?,
            Opcode::Sub => self.binary_op(sub_values)?,
            Opcode::Mul => self.binary_op(mul_values)?,
            Opcode::Div => self.binary_op(div_values)?,
            Opcode::Rem => self.binary_op(rem_values)?,
            Opcode::Pow => self.binary_op(pow_values)?,

            // === Comparison ===
            Opcode::Eq => self.binary_op(|a, b| Ok(Value::Bool(equals(&a, &b))))?,
            Opcode::Ne => self.binary_op(|a, b| Ok(Value::Bool(!equals(&a, &b))))?,
            Opcode::Lt => self.binary_op(lt_values)?,
            Opcode::Le => self.binary_op(le_values)?,
            Opcode::Gt => self.binary_op(gt_values)?,
            Opcode::Ge => self.binary_op(ge_values)?,

            // === Bitwise ===
            Opcode::BitAnd => self.binary_op(bit_and)?,
            Opcode::BitOr => self.binary_op(bit_or)?,

            // === Control Flow ===
            Opcode::Jmp(label) => self.pc = self.resolve(program, *label)?,
            Opcode::JmpTrue(label) => {
                if self.pop()?.is_truthy() {
                    self.pc = self.resolve(program, *label)?;
                }
            }
            Opcode::JmpFalse(label) => {
                if !self.pop()?.is_truthy() {
                    self.pc = self.resolve(program, *label)?;
                }
            }
            Opcode::Call { argc, is_method } => {
                let callee = self.pop()?;
                let receiver = if *is_method { Some(self.pop()?) } else { None };
                let args = self.pop_args(*argc)?;
                self.call_value(callee, receiver, args)?;
            }
            Opcode::Return => {
                let value = self.pop()?;
                match self.stack.pop() {
                    Some(StackEntry::Frame(frame)) => {
                        self.section = frame.return_section;
                        self.pc = frame.return_pc;
                        self.env = frame.env;
                        self.push(value);
                        if frame.from_host {
                            return Ok(Flow::Stop(Stop::HostReturn));
                        }
                    }
                    other => return Err(unexpected_entry("RETURN", "call frame", other.as_ref())),
                }
            }

            // === Scopes and Markers ===
            Opcode::EnterScope => self.env = self.env.child(),
            Opcode::LeaveScope => {
                let parent = self
                    .env
                    .parent()
                    .cloned()
                    .ok_or_else(|| Error::invariant("LEAVE_SCOPE at the global scope"))?;
                self.env = parent;
            }
            Opcode::LoopStart => {
                self.stack.push(StackEntry::Loop(LoopMarker {
                    env: self.env.clone(),
                }));
            }
            Opcode::LoopEnd => match self.stack.pop() {
                Some(StackEntry::Loop(_)) => {}
                other => return Err(unexpected_entry("LOOP_END", "loop marker", other.as_ref())),
            },
            Opcode::LoopExit(label) => {
                loop {
                    match self.stack.pop() {
                        Some(StackEntry::Value(_)) => {}
                        Some(StackEntry::Loop(marker)) => {
                            self.env = marker.env.clone();
                            self.stack.push(StackEntry::Loop(marker));
                            break;
                        }
                        other => {
                            return Err(unexpected_entry("LOOP_EXIT", "loop marker", other.as_ref()));
                        }
                    }
                }
                self.pc = self.resolve(program, *label)?;
            }
            Opcode::Try {
                target,
                finally,
                keep_value,
            } => {
                let held = if *keep_value { Some(self.pop()?) } else { None };
                let handler_pc = self.resolve(program, *target)?;
                let finally_pc = finally
                    .map(|label| self.resolve(program, label))
                    .transpose()?;
                self.stack.push(StackEntry::Try(TryRegion {
                    section: self.section,
                    handler_pc,
                    finally_pc,
                    env: self.env.clone(),
                }));
                if let Some(value) = held {
                    self.push(value);
                }
            }
            Opcode::EndTry => match self.stack.pop() {
                Some(StackEntry::Try(_)) => {}
                other => return Err(unexpected_entry("END_TRY", "try region", other.as_ref())),
            },
            Opcode::Throw => {
                let value = self.pop()?;
                return Err(Error::thrown(value));
            }

            // === Construction ===
            Opcode::CreateObject { class, argc } => {
                let args = self.pop_args(*argc)?;
                self.instantiate(program, class, args)?;
            }
            Opcode::CreateArray(count) => {
                let items = self.pop_args(*count)?;
                self.push(Value::array(items));
            }
            Opcode::CreateRecord(keys) => {
                let values = self.pop_args(keys.len())?;
                let record = ObjectRef::new(RECORD_CLASS, &self.global);
                for (key, value) in keys.iter().zip(values) {
                    record.fields().define(key.clone(), value);
                }
                self.push(Value::Object(record));
            }

            // === Misc ===
            Opcode::Debugger => {
                let location = self.location(program, instr.span);
                if self.host_calls > 0 {
                    debug!(%location, "breakpoint ignored during host call");
                } else {
                    debug!(%location, "breakpoint");
                    (self.log_sink)(&format!("debugger: paused at {location}"));
                    return Ok(Flow::Stop(Stop::Breakpoint));
                }
            }
            Opcode::Eof => return Ok(Flow::Stop(Stop::Eof)),
        }
        Ok(Flow::Continue)
    }

    // =========================================================================
    // Calls
    // =========================================================================

    fn call_value(
        &mut self,
        callee: Value,
        receiver: Option<Value>,
        args: Vec<Value>,
    ) -> Result<()> {
        match callee {
            Value::Function(func) => {
                self.enter_function(&func, receiver.as_ref(), args, false);
                Ok(())
            }
            Value::Native(handle) if handle.is_callable() => {
                let result = self.call_native(&handle, receiver.as_ref(), &args)?;
                self.push(result);
                Ok(())
            }
            other => Err(Error::not_callable(other.value_type())),
        }
    }

    /// Pushes a frame for `func` and jumps to its first instruction.
    fn enter_function(
        &mut self,
        func: &ScriptFunction,
        receiver: Option<&Value>,
        args: Vec<Value>,
        from_host: bool,
    ) {
        let env = match receiver {
            Some(Value::Object(object)) => {
                // The call scope holds the receiver strongly until RETURN.
                let env = object.fields().child();
                env.define(THIS, Value::Object(object.clone()));
                env
            }
            _ => self.global.child(),
        };
        let argc = args.len();
        let mut args = args.into_iter();
        for param in &func.params {
            env.define(param.clone(), args.next().unwrap_or(Value::Undefined));
        }

        let caller_env = std::mem::replace(&mut self.env, env);
        self.stack.push(StackEntry::Frame(CallFrame {
            return_section: self.section,
            return_pc: self.pc,
            env: caller_env,
            callee: func.name.clone(),
            from_host,
        }));
        self.section = func.section;
        self.pc = 0;
        debug!(function = %func.name, argc, from_host, "enter function");
    }

    fn call_native(
        &mut self,
        handle: &NativeHandle,
        this: Option<&Value>,
        args: &[Value],
    ) -> Result<Value> {
        debug!(native = handle.type_name(), argc = args.len(), "native call");
        let mut ctx = HostContext::new(this, &mut *self.log_sink);
        handle.call(&mut ctx, args)
    }

    fn instantiate(&mut self, program: &Program, class: &str, args: Vec<Value>) -> Result<()> {
        if let Some(methods) = program.class_methods(class) {
            let object = ObjectRef::new(class, &self.global);
            let mut constructor = None;
            for method in methods {
                let Some(name) = method.method_of(class) else {
                    continue;
                };
                if name == CONSTRUCTOR {
                    constructor = Some(Rc::clone(method));
                }
                object
                    .fields()
                    .define(name, Value::Function(Rc::clone(method)));
            }
            debug!(class, "created object");

            let receiver = Value::Object(object);
            match constructor {
                Some(ctor) => self.enter_function(&ctor, Some(&receiver), args, false),
                None => self.push(receiver),
            }
            return Ok(());
        }

        // `new Error(..)` and friends construct through the native.
        match self.natives.get(class).filter(|h| h.is_callable()).cloned() {
            Some(handle) => {
                let result = self.call_native(&handle, None, &args)?;
                self.push(result);
                Ok(())
            }
            None => Err(Error::new(ErrorKind::UndefinedClass(class.to_string()))),
        }
    }

    // =========================================================================
    // Names and Properties
    // =========================================================================

    fn lookup(&self, program: &Program, name: &str) -> Result<Value> {
        if let Some(value) = self.env.try_get(name) {
            return Ok(value);
        }
        if let Some(func) = program.function(name) {
            return Ok(Value::Function(Rc::clone(func)));
        }
        if let Some(handle) = self.natives.get(name) {
            return Ok(Value::Native(Rc::clone(handle)));
        }
        Err(Error::undefined_variable(name))
    }

    /// Pops the computed key for the indexer; names a fixed property otherwise.
    fn property_key(&mut self, name: &str) -> Result<Value> {
        if name == INDEXER {
            self.pop()
        } else {
            Ok(Value::from(name))
        }
    }

    fn get_property(&self, target: &Value, key: &Value) -> Result<Value> {
        match target {
            Value::Object(object) => Ok(object
                .fields()
                .get_local(&key_name(key))
                .unwrap_or(Value::Undefined)),
            Value::Array(array) => Ok(self.builtins.array_property(array, key)),
            Value::String(text) => Ok(self.builtins.string_property(text, key)),
            Value::Regex(regex) => Ok(self.builtins.regex_property(regex, &key_name(key))),
            Value::Error(message) => match key.as_str() {
                Some("message") => Ok(Value::String(Rc::clone(message))),
                _ => Ok(Value::Undefined),
            },
            Value::Native(handle) => handle.get_property(&key_name(key)),
            other => Err(Error::invalid_property(key_name(key), other.value_type())),
        }
    }

    fn set_property(&self, target: &Value, key: &Value, value: Value) -> Result<()> {
        match target {
            Value::Object(object) => {
                object.fields().assign_field(&key_name(key), value);
                Ok(())
            }
            Value::Array(array) => match key.as_index() {
                Some(index) => array.set(index, value),
                None => Err(Error::invalid_property(key_name(key), target.value_type())),
            },
            Value::Native(handle) => handle.set_property(&key_name(key), value),
            other => Err(Error::invalid_property(key_name(key), other.value_type())),
        }
    }

    // =========================================================================
    // Errors and Unwinding
    // =========================================================================

    /// Routes an error to the nearest try region.
    ///
    /// Returns `Ok` when a handler took over, the error to surface otherwise.
    fn handle_error(&mut self, program: &Program, err: Error, span: Span) -> Result<()> {
        if !err.is_catchable() {
            return Err(self.fatal(err, Some(span)));
        }

        let thrown = match &err.kind {
            ErrorKind::Thrown(value) => value.clone(),
            kind => Value::error(kind.to_string()),
        };
        let mut context = self.context_at(program, Some(span));

        while let Some(entry) = self.stack.pop() {
            match entry {
                StackEntry::Try(region) => {
                    debug!(
                        section = region.section,
                        handler = region.handler_pc,
                        value = ?thrown,
                        "caught"
                    );
                    self.section = region.section;
                    self.pc = region.handler_pc;
                    self.env = region.env;
                    self.push(thrown);
                    return Ok(());
                }
                StackEntry::Frame(frame) => {
                    context = context.with_frame(frame.callee);
                    self.section = frame.return_section;
                    self.pc = frame.return_pc;
                    self.env = frame.env;
                    if frame.from_host {
                        return Err(self.uncaught(err, thrown, context));
                    }
                }
                StackEntry::Value(_) | StackEntry::Loop(_) => {}
            }
        }

        let err = self.uncaught(err, thrown, context);
        self.state = VmState::Error;
        Err(err)
    }

    fn uncaught(&mut self, err: Error, thrown: Value, context: ErrorContext) -> Error {
        let err = match err.kind {
            ErrorKind::Thrown(_) => Error::uncaught(thrown.message()),
            kind => Error::new(kind),
        };
        warn!(error = %err, "uncaught exception");
        (self.log_sink)(&format!("{err} {context}"));
        self.last_exception = Some(thrown);
        err.with_context(context)
    }

    /// Puts the VM into the error state and attaches a position.
    fn fatal(&mut self, err: Error, span: Option<Span>) -> Error {
        self.state = VmState::Error;
        let program = Rc::clone(&self.program);
        let context = self.context_at(&program, span);
        error!(error = %err, section = self.section, pc = self.pc, "vm halted");
        err.with_context(context)
    }

    fn context_at(&self, program: &Program, span: Option<Span>) -> ErrorContext {
        let mut context = ErrorContext::new();
        if let Some(section) = program.section(self.section) {
            context = context.with_source(section.name.clone());
        }
        match span {
            Some(span) if !span.is_unknown() => context.with_position(span.line, span.column),
            _ => context,
        }
    }

    fn location(&self, program: &Program, span: Span) -> String {
        let section = program
            .section(self.section)
            .map_or("?", |s| s.name.as_str());
        format!("{section}:{span}")
    }

    fn check_limits(&self) -> Result<()> {
        if self.stack.len() > self.config.max_stack_size {
            return Err(Error::limit_exceeded(ResourceLimit::StackOverflow {
                limit: self.config.max_stack_size,
            }));
        }
        if let Some(limit) = self.config.max_cycle_count {
            if self.cycles >= limit {
                return Err(Error::limit_exceeded(ResourceLimit::CycleBudget { limit }));
            }
        }
        Ok(())
    }

    // =========================================================================
    // Stack Helpers
    // =========================================================================

    fn push(&mut self, value: Value) {
        self.stack.push(StackEntry::Value(value));
    }

    fn pop(&mut self) -> Result<Value> {
        match self.stack.pop() {
            Some(StackEntry::Value(value)) => Ok(value),
            other => Err(unexpected_entry("pop", "value", other.as_ref())),
        }
    }

    fn peek(&self) -> Result<&Value> {
        match self.stack.last() {
            Some(StackEntry::Value(value)) => Ok(value),
            other => Err(unexpected_entry("peek", "value", other)),
        }
    }

    /// Pops `count` values, returning them in push order.
    fn pop_args(&mut self, count: usize) -> Result<Vec<Value>> {
        let mut args = Vec::with_capacity(count);
        for _ in 0..count {
            args.push(self.pop()?);
        }
        args.reverse();
        Ok(args)
    }

    fn binary_op<F>(&mut self, op: F) -> Result<()>
    where
        F: FnOnce(Value, Value) -> Result<Value>,
    {
        let b = self.pop()?;
        let a = self.pop()?;
        let result = op(a, b)?;
        self.push(result);
        Ok(())
    }

    fn resolve(&self, program: &Program, label: LabelId) -> Result<usize> {
        program
            .jump_target(label)
            .ok_or_else(|| Error::invariant(format!("unknown label L{label}")))
    }
}

impl fmt::Debug for Vm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Vm")
            .field("state", &self.state)
            .field("section", &self.section)
            .field("pc", &self.pc)
            .field("stack", &self.stack)
            .field("cycles", &self.cycles)
            .field("natives", &self.natives)
            .finish_non_exhaustive()
    }
}

fn key_name(key: &Value) -> String {
    match key {
        Value::String(s) => s.to_string(),
        other => other.to_string(),
    }
}

fn unexpected_entry(op: &str, expected: &str, found: Option<&StackEntry>) -> Error {
    let found = found.map_or("an empty stack", StackEntry::kind);
    Error::invariant(format!("{op} expected a {expected}, found {found}"))
}
