//! A tree-walking interpreter for a small Lua subset.
//!
//! This is the embedded interpreter the adapter debugs: scalar values,
//! `local` declarations, assignment, top-level function definitions, calls,
//! `if`/`while`/`return`, and `print`. The interpreter keeps the capabilities
//! the adapter relies on front and center: the host's line hook fires before
//! every executed statement, call frames carry Lua-style source labels
//! (`@<path>` for files, `=[lua-dap]` for the launcher's shim root frame),
//! and locals enumerate in declaration order.

mod lexer;
mod parser;

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use thiserror::Error;

use crate::engine::{
    ChunkId, Engine, EngineError, FrameInfo, Host, LocalInfo, StackView, SHIM_SOURCE,
};
use parser::{BinOp, Expr, Stmt, UnOp};

const MAX_CALL_DEPTH: usize = 200;

/// A runtime value.
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Func(Rc<FuncDef>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Nil, Value::Nil) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Func(a), Value::Func(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Func(_) => "function",
        }
    }

    fn truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Bool(false))
    }
}

/// The interpreter's default stringification.
pub fn render(value: &Value) -> String {
    match value {
        Value::Nil => "nil".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => render_number(*n),
        Value::Str(s) => s.clone(),
        Value::Func(def) => format!("function: {}", def.name),
    }
}

fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.is_finite() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

/// `print`'s rendering: every argument quoted if it is a string, plain
/// otherwise, comma-separated, newline-terminated.
fn render_print_args(args: &[Value]) -> String {
    let mut parts = Vec::with_capacity(args.len());
    for value in args {
        match value {
            Value::Str(s) => parts.push(format!("{s:?}")),
            other => parts.push(render(other)),
        }
    }
    format!("{}\n", parts.join(", "))
}

/// A user function defined at the top level of a chunk.
#[derive(Debug)]
pub struct FuncDef {
    pub name: String,
    params: Vec<String>,
    body: Rc<[Stmt]>,
    source: Rc<str>,
    line: i64,
}

#[derive(Debug, Clone)]
struct Chunk {
    source: Rc<str>,
    body: Rc<[Stmt]>,
}

struct Frame {
    name: String,
    source: Rc<str>,
    line: i64,
    /// Slots in declaration order; enumeration order for the debugger.
    locals: Vec<(String, Value)>,
    varargs: Vec<Value>,
}

#[derive(Debug, Error)]
#[error("{source_name}:{line}: {message}")]
pub struct RuntimeError {
    source_name: String,
    line: i64,
    message: String,
}

enum Flow {
    Normal,
    Return(Value),
}

/// The interpreter instance. Globals survive across runs; the call stack
/// exists only while [`Engine::run`] is executing.
#[derive(Default)]
pub struct Vm {
    globals: HashMap<String, Value>,
    frames: Vec<Frame>,
    chunks: Vec<Chunk>,
}

impl Vm {
    pub fn new() -> Self {
        Self::default()
    }

    fn frame(&self) -> &Frame {
        self.frames.last().expect("interpreter has an active frame")
    }

    fn frame_mut(&mut self) -> &mut Frame {
        self.frames
            .last_mut()
            .expect("interpreter has an active frame")
    }

    fn fail(&self, message: String) -> RuntimeError {
        let frame = self.frame();
        RuntimeError {
            source_name: frame.source.trim_start_matches(['@', '=']).to_string(),
            line: frame.line,
            message,
        }
    }

    fn fire_line_hook(&mut self, host: &mut dyn Host, line: i64) -> Result<(), RuntimeError> {
        self.frame_mut().line = line;
        let view = VmStack {
            frames: &self.frames,
        };
        host.on_line(&view, line)
            .map_err(|fault| self.fail(fault.to_string()))
    }

    fn exec_block(&mut self, body: &[Stmt], host: &mut dyn Host) -> Result<Flow, RuntimeError> {
        for stmt in body {
            self.fire_line_hook(host, stmt.line())?;
            match stmt {
                Stmt::Local { name, value, .. } => {
                    let value = self.eval(value, host)?;
                    self.frame_mut().locals.push((name.clone(), value));
                }
                Stmt::Assign { name, value, .. } => {
                    let value = self.eval(value, host)?;
                    let frame = self.frame_mut();
                    match frame.locals.iter_mut().rev().find(|(n, _)| n == name) {
                        Some(slot) => slot.1 = value,
                        None => {
                            self.globals.insert(name.clone(), value);
                        }
                    }
                }
                Stmt::Call { name, args, line } => {
                    self.call(name, args, *line, host)?;
                }
                Stmt::Function {
                    name,
                    params,
                    body,
                    line,
                } => {
                    let def = FuncDef {
                        name: name.clone(),
                        params: params.clone(),
                        body: body.clone().into(),
                        source: self.frame().source.clone(),
                        line: *line,
                    };
                    self.globals
                        .insert(name.clone(), Value::Func(Rc::new(def)));
                }
                Stmt::If {
                    cond,
                    then_body,
                    else_body,
                    ..
                } => {
                    let branch = if self.eval(cond, host)?.truthy() {
                        then_body
                    } else {
                        else_body
                    };
                    if let Flow::Return(value) = self.exec_block(branch, host)? {
                        return Ok(Flow::Return(value));
                    }
                }
                Stmt::While { cond, body, .. } => {
                    while self.eval(cond, host)?.truthy() {
                        if let Flow::Return(value) = self.exec_block(body, host)? {
                            return Ok(Flow::Return(value));
                        }
                    }
                }
                Stmt::Return { value, .. } => {
                    let value = match value {
                        Some(expr) => self.eval(expr, host)?,
                        None => Value::Nil,
                    };
                    return Ok(Flow::Return(value));
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn eval(&mut self, expr: &Expr, host: &mut dyn Host) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Nil => Ok(Value::Nil),
            Expr::True => Ok(Value::Bool(true)),
            Expr::False => Ok(Value::Bool(false)),
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Varargs => Ok(self.frame().varargs.first().cloned().unwrap_or(Value::Nil)),
            Expr::Name(name) => Ok(self.resolve(name)),
            Expr::Call { name, args, line } => self.call(name, args, *line, host),
            Expr::Unary { op, operand, .. } => {
                let value = self.eval(operand, host)?;
                match op {
                    UnOp::Not => Ok(Value::Bool(!value.truthy())),
                    UnOp::Neg => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => Err(self.fail(format!(
                            "attempt to perform arithmetic on a {} value",
                            other.type_name()
                        ))),
                    },
                }
            }
            Expr::Binary { op, lhs, rhs, .. } => self.eval_binary(*op, lhs, rhs, host),
        }
    }

    fn eval_binary(
        &mut self,
        op: BinOp,
        lhs: &Expr,
        rhs: &Expr,
        host: &mut dyn Host,
    ) -> Result<Value, RuntimeError> {
        // and/or short-circuit on the left value.
        if op == BinOp::And {
            let left = self.eval(lhs, host)?;
            return if left.truthy() {
                self.eval(rhs, host)
            } else {
                Ok(left)
            };
        }
        if op == BinOp::Or {
            let left = self.eval(lhs, host)?;
            return if left.truthy() {
                Ok(left)
            } else {
                self.eval(rhs, host)
            };
        }

        let left = self.eval(lhs, host)?;
        let right = self.eval(rhs, host)?;
        match op {
            BinOp::Add | BinOp::Sub | BinOp::Mul | BinOp::Div | BinOp::Mod => {
                let (Value::Number(a), Value::Number(b)) = (&left, &right) else {
                    let offender = if matches!(left, Value::Number(_)) {
                        &right
                    } else {
                        &left
                    };
                    return Err(self.fail(format!(
                        "attempt to perform arithmetic on a {} value",
                        offender.type_name()
                    )));
                };
                let n = match op {
                    BinOp::Add => a + b,
                    BinOp::Sub => a - b,
                    BinOp::Mul => a * b,
                    BinOp::Div => a / b,
                    _ => a % b,
                };
                Ok(Value::Number(n))
            }
            BinOp::Concat => {
                let part = |v: &Value| -> Option<String> {
                    match v {
                        Value::Str(s) => Some(s.clone()),
                        Value::Number(n) => Some(render_number(*n)),
                        _ => None,
                    }
                };
                match (part(&left), part(&right)) {
                    (Some(a), Some(b)) => Ok(Value::Str(format!("{a}{b}"))),
                    _ => {
                        let offender = if part(&left).is_none() { &left } else { &right };
                        Err(self.fail(format!(
                            "attempt to concatenate a {} value",
                            offender.type_name()
                        )))
                    }
                }
            }
            BinOp::Eq => Ok(Value::Bool(left == right)),
            BinOp::Ne => Ok(Value::Bool(left != right)),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => match (&left, &right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(compare(op, a, b))),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Bool(compare(op, a, b))),
                _ => Err(self.fail(format!(
                    "attempt to compare {} with {}",
                    left.type_name(),
                    right.type_name()
                ))),
            },
            BinOp::And | BinOp::Or => unreachable!("handled above"),
        }
    }

    fn resolve(&self, name: &str) -> Value {
        let frame = self.frame();
        if let Some((_, value)) = frame.locals.iter().rev().find(|(slot, _)| slot == name) {
            return value.clone();
        }
        self.globals.get(name).cloned().unwrap_or(Value::Nil)
    }

    fn eval_arguments(
        &mut self,
        args: &[Expr],
        host: &mut dyn Host,
    ) -> Result<Vec<Value>, RuntimeError> {
        let mut values = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let tail = i == args.len() - 1;
            if tail && matches!(arg, Expr::Varargs) {
                values.extend(self.frame().varargs.iter().cloned());
            } else {
                values.push(self.eval(arg, host)?);
            }
        }
        Ok(values)
    }

    fn call(
        &mut self,
        name: &str,
        args: &[Expr],
        line: i64,
        host: &mut dyn Host,
    ) -> Result<Value, RuntimeError> {
        self.frame_mut().line = line;
        let callee = self.resolve(name);
        let values = self.eval_arguments(args, host)?;
        match callee {
            Value::Func(def) => {
                if self.frames.len() >= MAX_CALL_DEPTH {
                    return Err(self.fail("stack overflow".to_string()));
                }
                let mut locals = Vec::with_capacity(def.params.len());
                for (i, param) in def.params.iter().enumerate() {
                    locals.push((
                        param.clone(),
                        values.get(i).cloned().unwrap_or(Value::Nil),
                    ));
                }
                self.frames.push(Frame {
                    name: def.name.clone(),
                    source: def.source.clone(),
                    line: def.line,
                    locals,
                    varargs: Vec::new(),
                });
                let flow = self.exec_block(&def.body, host);
                self.frames.pop();
                match flow? {
                    Flow::Return(value) => Ok(value),
                    Flow::Normal => Ok(Value::Nil),
                }
            }
            // `print` lives in the sandboxed environment and routes to the
            // host rather than the process stdout.
            Value::Nil if name == "print" => {
                let text = render_print_args(&values);
                host.on_print(&text)
                    .map_err(|fault| self.fail(fault.to_string()))?;
                Ok(Value::Nil)
            }
            Value::Nil => Err(self.fail(format!("attempt to call a nil value ('{name}')"))),
            other => Err(self.fail(format!(
                "attempt to call a {} value ('{name}')",
                other.type_name()
            ))),
        }
    }
}

fn compare<T: PartialOrd>(op: BinOp, a: &T, b: &T) -> bool {
    match op {
        BinOp::Lt => a < b,
        BinOp::Le => a <= b,
        BinOp::Gt => a > b,
        _ => a >= b,
    }
}

fn json_to_value(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Nil,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(0.0)),
        serde_json::Value::String(s) => Value::Str(s.clone()),
        other => Value::Str(other.to_string()),
    }
}

impl Engine for Vm {
    fn load(&mut self, path: &Path) -> Result<ChunkId, EngineError> {
        let text = fs::read_to_string(path).map_err(|err| EngineError::Load {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        let body = parser::parse(&text).map_err(|err| EngineError::Load {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        self.chunks.push(Chunk {
            source: format!("@{}", path.display()).into(),
            body: body.into(),
        });
        Ok(ChunkId(self.chunks.len() - 1))
    }

    fn run(
        &mut self,
        chunk: ChunkId,
        args: &[serde_json::Value],
        host: &mut dyn Host,
    ) -> Result<i64, EngineError> {
        let chunk = self
            .chunks
            .get(chunk.0)
            .cloned()
            .ok_or_else(|| EngineError::Runtime("unknown chunk".to_string()))?;
        let varargs = args.iter().map(json_to_value).collect();

        self.frames.clear();
        self.frames.push(Frame {
            name: "[lua-dap]".to_string(),
            source: SHIM_SOURCE.into(),
            line: 0,
            locals: Vec::new(),
            varargs: Vec::new(),
        });
        self.frames.push(Frame {
            name: "main chunk".to_string(),
            source: chunk.source.clone(),
            line: 0,
            locals: Vec::new(),
            varargs,
        });

        let result = self.exec_block(&chunk.body, host);
        self.frames.clear();

        match result {
            Ok(Flow::Return(Value::Number(code))) => Ok(code as i64),
            Ok(_) => Ok(0),
            Err(err) => Err(EngineError::Runtime(err.to_string())),
        }
    }
}

struct VmStack<'a> {
    frames: &'a [Frame],
}

impl StackView for VmStack<'_> {
    fn frame(&self, level: usize) -> Option<FrameInfo> {
        if level == 0 || level > self.frames.len() {
            return None;
        }
        let frame = &self.frames[self.frames.len() - level];
        Some(FrameInfo {
            name: frame.name.clone(),
            source: Some(frame.source.to_string()),
            line: frame.line,
        })
    }

    fn local(&self, level: usize, index: usize) -> Option<LocalInfo> {
        if level == 0 || level > self.frames.len() || index == 0 {
            return None;
        }
        let frame = &self.frames[self.frames.len() - level];
        let (name, value) = frame.locals.get(index - 1)?;
        Some(LocalInfo {
            name: name.clone(),
            value: render(value),
            type_name: value.type_name().to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::HostFault;
    use std::io::Write as _;

    /// Records hook lines, frame shapes at chosen lines, and printed text.
    #[derive(Default)]
    struct RecordingHost {
        lines: Vec<i64>,
        printed: Vec<String>,
        /// When a hook fires on this line, capture (frame name, locals) per level.
        capture_at: Option<i64>,
        captured: Vec<(String, Vec<(String, String)>)>,
    }

    impl Host for RecordingHost {
        fn on_line(&mut self, stack: &dyn StackView, line: i64) -> Result<(), HostFault> {
            self.lines.push(line);
            if self.capture_at == Some(line) && self.captured.is_empty() {
                let mut level = 1;
                while let Some(frame) = stack.frame(level) {
                    let mut locals = Vec::new();
                    let mut index = 1;
                    while let Some(local) = stack.local(level, index) {
                        locals.push((local.name, local.value));
                        index += 1;
                    }
                    self.captured.push((frame.name, locals));
                    level += 1;
                }
            }
            Ok(())
        }

        fn on_print(&mut self, text: &str) -> Result<(), HostFault> {
            self.printed.push(text.to_string());
            Ok(())
        }
    }

    fn write_script(text: &str) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("t.lua");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(text.as_bytes()).unwrap();
        (dir, path)
    }

    fn run_script(text: &str, args: &[serde_json::Value]) -> (Result<i64, EngineError>, RecordingHost) {
        let (_dir, path) = write_script(text);
        let mut vm = Vm::new();
        let chunk = vm.load(&path).unwrap();
        let mut host = RecordingHost::default();
        let result = vm.run(chunk, args, &mut host);
        (result, host)
    }

    #[test]
    fn arithmetic_locals_and_exit_code() {
        let (result, _) = run_script("local a = 2\nlocal b = a * 3 + 1\nreturn b", &[]);
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn completion_without_return_exits_zero() {
        let (result, _) = run_script("local a = 1", &[]);
        assert_eq!(result.unwrap(), 0);
    }

    #[test]
    fn hook_fires_per_statement_with_lines() {
        let (result, host) = run_script("local a = 1\nlocal b = 2\na = b", &[]);
        assert_eq!(result.unwrap(), 0);
        assert_eq!(host.lines, vec![1, 2, 3]);
    }

    #[test]
    fn call_frames_are_visible_to_the_stack_view() {
        let script = "\
function add(a, b)
  local sum = a + b
  return sum
end
local r = add(3, 4)
return r";
        let (_dir, path) = write_script(script);
        let mut vm = Vm::new();
        let chunk = vm.load(&path).unwrap();
        let mut host = RecordingHost {
            capture_at: Some(3),
            ..Default::default()
        };
        let result = vm.run(chunk, &[], &mut host);
        assert_eq!(result.unwrap(), 7);

        // Innermost add(), then the main chunk, then the adapter shim.
        let names: Vec<&str> = host.captured.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, ["add", "main chunk", "[lua-dap]"]);
        let (_, add_locals) = &host.captured[0];
        assert_eq!(
            add_locals,
            &[
                ("a".to_string(), "3".to_string()),
                ("b".to_string(), "4".to_string()),
                ("sum".to_string(), "7".to_string()),
            ]
        );
    }

    #[test]
    fn print_routes_to_the_host_with_quoted_rendering() {
        let (result, host) = run_script("print(\"hi\", 1, true, nil)", &[]);
        assert_eq!(result.unwrap(), 0);
        assert_eq!(host.printed, vec!["\"hi\", 1, true, nil\n".to_string()]);
    }

    #[test]
    fn varargs_reach_the_main_chunk() {
        let (result, host) = run_script(
            "print(...)",
            &[serde_json::json!(1), serde_json::json!("x")],
        );
        assert_eq!(result.unwrap(), 0);
        assert_eq!(host.printed, vec!["1, \"x\"\n".to_string()]);
    }

    #[test]
    fn control_flow_runs() {
        let script = "\
local n = 0
local i = 1
while i <= 4 do
  if i % 2 == 0 then
    n = n + i
  end
  i = i + 1
end
return n";
        let (result, _) = run_script(script, &[]);
        assert_eq!(result.unwrap(), 6);
    }

    #[test]
    fn concat_and_comparison() {
        let (result, host) = run_script(
            "local s = \"v=\" .. 2\nif s == \"v=2\" then print(s) end",
            &[],
        );
        assert_eq!(result.unwrap(), 0);
        assert_eq!(host.printed, vec!["\"v=2\"\n".to_string()]);
    }

    #[test]
    fn calling_nil_is_a_runtime_error_with_location() {
        let (result, _) = run_script("local a = 1\nmissing(a)", &[]);
        match result {
            Err(EngineError::Runtime(message)) => {
                assert!(message.contains("attempt to call a nil value ('missing')"));
                assert!(message.contains(":2:"), "no line in {message:?}");
            }
            other => panic!("expected runtime error, got {other:?}"),
        }
    }

    #[test]
    fn arithmetic_on_strings_fails() {
        let (result, _) = run_script("local a = \"x\" + 1", &[]);
        assert!(matches!(result, Err(EngineError::Runtime(_))));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let mut vm = Vm::new();
        assert!(matches!(
            vm.load(Path::new("/definitely/not/here.lua")),
            Err(EngineError::Load { .. })
        ));
    }

    #[test]
    fn syntax_error_is_a_load_error() {
        let (_dir, path) = write_script("local = nope");
        let mut vm = Vm::new();
        assert!(matches!(vm.load(&path), Err(EngineError::Load { .. })));
    }

    #[test]
    fn host_fault_aborts_the_script() {
        struct FailingHost;
        impl Host for FailingHost {
            fn on_line(&mut self, _stack: &dyn StackView, _line: i64) -> Result<(), HostFault> {
                Err(HostFault("session torn down".to_string()))
            }
            fn on_print(&mut self, _text: &str) -> Result<(), HostFault> {
                Ok(())
            }
        }
        let (_dir, path) = write_script("local a = 1");
        let mut vm = Vm::new();
        let chunk = vm.load(&path).unwrap();
        let result = vm.run(chunk, &[], &mut FailingHost);
        assert!(matches!(result, Err(EngineError::Runtime(_))));
    }

    #[test]
    fn runaway_recursion_overflows_cleanly() {
        let (result, _) = run_script("function f()\n  f()\nend\nf()", &[]);
        match result {
            Err(EngineError::Runtime(message)) => assert!(message.contains("stack overflow")),
            other => panic!("expected overflow, got {other:?}"),
        }
    }
}
