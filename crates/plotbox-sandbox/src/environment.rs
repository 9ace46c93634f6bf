//! Restricted script environment.
//!
//! Each run gets a fresh interpreter whose global object is pruned down to a
//! fixed allow-list of intrinsics, then extended with the capabilities in
//! [`CAPABILITIES`] and the numeric namespaces. Module loading is never
//! available: `import` declarations do not parse in script code and the
//! default module loader rejects dynamic `import()`.
//!
//! All per-run mutable state lives in one [`ExecutionContext`] shared with
//! the native functions of that run only.

use crate::chart::{self, Chart, Marker, Renderer};
use crate::numeric;
use crate::{Result, SandboxError};
use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{
    js_string, Context, JsArgs, JsNativeError, JsObject, JsResult, JsString, JsValue,
    NativeFunction, Source,
};
use boa_gc::{Finalize, Trace};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

/// Intrinsics that survive pruning of the global object.
pub const ALLOWED_GLOBALS: &[&str] = &[
    "globalThis",
    "undefined",
    "NaN",
    "Infinity",
    "isNaN",
    "isFinite",
    "parseInt",
    "parseFloat",
    "Object",
    "Array",
    "Number",
    "String",
    "Boolean",
    "Symbol",
    "Math",
    "JSON",
    "Map",
    "Set",
    "Error",
    "TypeError",
    "RangeError",
    "ReferenceError",
    "SyntaxError",
    "EvalError",
    "URIError",
    "AggregateError",
];

/// Native capabilities installed as globals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    Print,
    ConsoleLog,
    ConsoleError,
    NewPlot,
    PlotFunction,
    PlotPoints,
    PlotParametric,
}

/// Global name, arity and capability of every top-level native function.
///
/// `console.log` and `console.error` are installed on the `console` object
/// rather than as globals.
pub const CAPABILITIES: &[(&str, usize, Capability)] = &[
    ("print", 1, Capability::Print),
    ("new_plot", 4, Capability::NewPlot),
    ("plot_function", 5, Capability::PlotFunction),
    ("plot_points", 3, Capability::PlotPoints),
    ("plot_parametric", 6, Capability::PlotParametric),
];

/// Property carrying a chart handle's arena index.
pub(crate) const CHART_ID_KEY: &str = "__chart_id";

/// Per-stream capture ceiling in bytes.
const MAX_OUTPUT_BYTES: usize = 1024 * 1024;

const TRUNCATION_MARKER: &str = "\n[Output truncated]\n";

/// Interpreter limits of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentOptions {
    /// Maximum call depth.
    #[serde(default = "default_recursion_limit")]
    pub recursion_limit: usize,

    /// Maximum interpreter stack size, in values.
    #[serde(default = "default_stack_size_limit")]
    pub stack_size_limit: usize,
}

fn default_recursion_limit() -> usize {
    256
}

fn default_stack_size_limit() -> usize {
    64 * 1024
}

impl Default for EnvironmentOptions {
    fn default() -> Self {
        Self {
            recursion_limit: default_recursion_limit(),
            stack_size_limit: default_stack_size_limit(),
        }
    }
}

/// Mutable state of one run: captured output and the chart arena.
#[derive(Debug)]
pub struct ExecutionContext {
    stdout: String,
    stderr: String,
    charts: Vec<Chart>,
    current: usize,
}

impl ExecutionContext {
    /// Fresh state with one empty default chart selected.
    pub fn new() -> Self {
        Self {
            stdout: String::new(),
            stderr: String::new(),
            charts: vec![Chart::default()],
            current: 0,
        }
    }

    /// Captured standard output.
    pub fn stdout(&self) -> &str {
        &self.stdout
    }

    /// Captured standard error.
    pub fn stderr(&self) -> &str {
        &self.stderr
    }

    /// Look up a chart by arena index.
    pub fn chart(&self, id: usize) -> Option<&Chart> {
        self.charts.get(id)
    }

    /// The chart drawing calls target when no target is given.
    pub fn current_chart(&self) -> &Chart {
        &self.charts[self.current]
    }

    /// Index of the current default chart.
    pub fn current_id(&self) -> usize {
        self.current
    }

    /// Add a chart and make it the current default.
    pub fn push_chart(&mut self, chart: Chart) -> usize {
        self.charts.push(chart);
        self.current = self.charts.len() - 1;
        self.current
    }

    fn draw(&mut self, id: usize, renderer: Renderer) -> JsResult<()> {
        let Some(chart) = self.charts.get_mut(id) else {
            return Ok(());
        };
        chart
            .draw(renderer)
            .map_err(|e| JsNativeError::range().with_message(e.to_string()).into())
    }

    fn write_stdout(&mut self, text: &str) {
        append_capped(&mut self.stdout, text);
    }

    fn write_stderr(&mut self, text: &str) {
        append_capped(&mut self.stderr, text);
    }

    /// Take the captured output, leaving empty buffers behind.
    pub fn take_output(&mut self) -> (String, String) {
        (
            std::mem::take(&mut self.stdout),
            std::mem::take(&mut self.stderr),
        )
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new()
    }
}

fn append_capped(buffer: &mut String, text: &str) {
    if buffer.len() >= MAX_OUTPUT_BYTES {
        return;
    }
    let room = MAX_OUTPUT_BYTES - buffer.len();
    if text.len() <= room {
        buffer.push_str(text);
        return;
    }
    let mut cut = room;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    buffer.push_str(&text[..cut]);
    buffer.push_str(TRUNCATION_MARKER);
}

/// Captures handed to every native capability.
#[derive(Clone, Trace, Finalize)]
struct Host {
    #[unsafe_ignore_trace]
    state: Rc<RefCell<ExecutionContext>>,
    #[unsafe_ignore_trace]
    capability: Capability,
}

/// A restricted interpreter plus the state of the run it hosts.
pub struct Environment {
    context: Context,
    state: Rc<RefCell<ExecutionContext>>,
}

impl Environment {
    /// Build a fresh environment.
    pub fn new(options: &EnvironmentOptions) -> Result<Self> {
        let mut context = Context::default();
        context
            .runtime_limits_mut()
            .set_recursion_limit(options.recursion_limit);
        context
            .runtime_limits_mut()
            .set_stack_size_limit(options.stack_size_limit);

        prune_globals(&mut context)?;

        let state = Rc::new(RefCell::new(ExecutionContext::new()));
        install_capabilities(&mut context, &state)
            .map_err(|e| SandboxError::environment(e.to_string()))?;

        let mut env = Self { context, state };
        let id = env.state.borrow().current_id();
        let handle = chart_handle(id, &mut env.context);
        bind_default_chart(&handle, &mut env.context)
            .map_err(|e| SandboxError::environment(e.to_string()))?;

        Ok(env)
    }

    /// Run a script. A script fault is returned as its message.
    pub fn execute(&mut self, code: &str) -> std::result::Result<(), String> {
        match self.context.eval(Source::from_bytes(code)) {
            Ok(_) => Ok(()),
            Err(err) => {
                let text = match err.try_native(&mut self.context) {
                    Ok(native) => native.to_string(),
                    Err(_) => err.to_string(),
                };
                Err(format!("Uncaught {}", text))
            }
        }
    }

    /// Evaluate an expression, treating any failure as absence.
    pub(crate) fn lookup(&mut self, expression: &str) -> Option<JsValue> {
        self.context.eval(Source::from_bytes(expression)).ok()
    }

    /// Resolve a value to the chart its handle points at.
    pub(crate) fn chart_of(&mut self, value: &JsValue) -> Option<Chart> {
        let id = chart_id(value, &mut self.context)?;
        self.state.borrow().chart(id).cloned()
    }

    /// Borrow the run state.
    pub fn state(&self) -> std::cell::Ref<'_, ExecutionContext> {
        self.state.borrow()
    }

    /// Take the captured output.
    pub fn take_output(&mut self) -> (String, String) {
        self.state.borrow_mut().take_output()
    }
}

/// Delete every global that is not allow-listed.
fn prune_globals(context: &mut Context) -> Result<()> {
    let allowed = ALLOWED_GLOBALS
        .iter()
        .map(|name| format!("\"{}\"", name))
        .collect::<Vec<_>>()
        .join(",");
    let script = format!(
        r#"(function () {{
    var allowed = new Set([{allowed}]);
    var global = globalThis;
    Object.getOwnPropertyNames(global).forEach(function (key) {{
        if (!allowed.has(key)) {{
            try {{ delete global[key]; }} catch (e) {{ global[key] = undefined; }}
        }}
    }});
}})();"#
    );

    context
        .eval(Source::from_bytes(&script))
        .map(|_| ())
        .map_err(|e| SandboxError::environment(format!("failed to prune globals: {}", e)))
}

fn install_capabilities(context: &mut Context, state: &Rc<RefCell<ExecutionContext>>) -> JsResult<()> {
    let host = |capability| Host {
        state: Rc::clone(state),
        capability,
    };

    for &(name, length, capability) in CAPABILITIES {
        context.register_global_callable(JsString::from(name), length, native(host(capability)))?;
    }

    let console = ObjectInitializer::new(context)
        .function(native(host(Capability::ConsoleLog)), js_string!("log"), 0)
        .function(native(host(Capability::ConsoleError)), js_string!("error"), 0)
        .build();
    context.register_global_property(js_string!("console"), console, Attribute::all())?;

    let np = numeric::numpy_namespace(context);
    context.register_global_property(js_string!("np"), np.clone(), Attribute::all())?;
    context.register_global_property(js_string!("numpy"), np, Attribute::all())?;

    let math = numeric::math_namespace(context);
    context.register_global_property(js_string!("math"), math, Attribute::all())?;

    Ok(())
}

fn native(host: Host) -> NativeFunction {
    NativeFunction::from_copy_closure_with_captures(
        |_, args, host, ctx| dispatch(host, args, ctx),
        host,
    )
}

fn dispatch(host: &Host, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    match host.capability {
        Capability::Print | Capability::ConsoleLog => {
            let line = format_line(args, context)?;
            host.state.borrow_mut().write_stdout(&line);
            Ok(JsValue::undefined())
        }
        Capability::ConsoleError => {
            let line = format_line(args, context)?;
            host.state.borrow_mut().write_stderr(&line);
            Ok(JsValue::undefined())
        }
        Capability::NewPlot => new_plot(&host.state, args, context),
        Capability::PlotFunction => plot_function(&host.state, args, context),
        Capability::PlotPoints => plot_points(&host.state, args, context),
        Capability::PlotParametric => plot_parametric(&host.state, args, context),
    }
}

/// Space-joined rendering of print arguments, newline terminated.
fn format_line(args: &[JsValue], context: &mut Context) -> JsResult<String> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(format_value(arg, context)?);
    }
    let mut line = parts.join(" ");
    line.push('\n');
    Ok(line)
}

fn format_value(value: &JsValue, context: &mut Context) -> JsResult<String> {
    if let Some(object) = value.as_object() {
        if chart_id(value, context).is_some() {
            return Ok("<chart>".to_string());
        }
        if !object.is_callable() {
            if let Ok(json) = value.to_json(context) {
                return Ok(json.to_string());
            }
        }
    }
    Ok(value.to_string(context)?.to_std_string_escaped())
}

/// Script-visible handle of an arena chart.
fn chart_handle(id: usize, context: &mut Context) -> JsObject {
    ObjectInitializer::new(context)
        .property(
            JsString::from(CHART_ID_KEY),
            JsValue::new(id as i32),
            Attribute::READONLY | Attribute::NON_ENUMERABLE | Attribute::PERMANENT,
        )
        .build()
}

/// Arena index of a chart handle, if the value is one.
fn chart_id(value: &JsValue, context: &mut Context) -> Option<usize> {
    let object = value.as_object()?;
    let id = object
        .get(JsString::from(CHART_ID_KEY), context)
        .ok()?
        .as_number()?;
    (id.is_finite() && id >= 0.0 && id.fract() == 0.0).then_some(id as usize)
}

fn bind_default_chart(handle: &JsObject, context: &mut Context) -> JsResult<()> {
    let global = context.global_object();
    global.set(js_string!("plot"), handle.clone(), false, context)?;
    global.set(js_string!("default_plot"), handle.clone(), false, context)?;
    Ok(())
}

/// Named option of a trailing options object; `undefined` and `null` count as absent.
fn option(options: &JsValue, key: &str, context: &mut Context) -> JsResult<Option<JsValue>> {
    let Some(object) = options.as_object() else {
        return Ok(None);
    };
    let value = object.get(JsString::from(key), context)?;
    Ok((!value.is_null_or_undefined()).then_some(value))
}

fn string_option(options: &JsValue, key: &str, default: &str, context: &mut Context) -> JsResult<String> {
    match option(options, key, context)? {
        Some(value) => Ok(value.to_string(context)?.to_std_string_escaped()),
        None => Ok(default.to_string()),
    }
}

fn legend_option(options: &JsValue, context: &mut Context) -> JsResult<Option<String>> {
    option(options, "legend", context)?
        .map(|value| value.to_string(context).map(|s| s.to_std_string_escaped()))
        .transpose()
}

fn number_option(options: &JsValue, key: &str, default: f64, context: &mut Context) -> JsResult<f64> {
    match option(options, key, context)? {
        Some(value) => value.to_number(context),
        None => Ok(default),
    }
}

fn number_arg(args: &[JsValue], index: usize, default: f64, context: &mut Context) -> JsResult<f64> {
    let value = args.get_or_undefined(index);
    if value.is_undefined() {
        Ok(default)
    } else {
        value.to_number(context)
    }
}

fn sample_count(args: &[JsValue], index: usize, context: &mut Context) -> JsResult<usize> {
    let num = number_arg(args, index, chart::DEFAULT_SAMPLES as f64, context)?;
    if num.is_nan() || num < 0.0 || num > chart::MAX_CHART_POINTS as f64 {
        return Err(JsNativeError::range()
            .with_message(format!(
                "invalid sample count: {} (at most {} points per chart)",
                num,
                chart::MAX_CHART_POINTS
            ))
            .into());
    }
    Ok(num as usize)
}

/// Resolve `opts.target`, falling back to the current default chart.
fn target_chart(
    state: &Rc<RefCell<ExecutionContext>>,
    options: &JsValue,
    context: &mut Context,
) -> JsResult<(usize, JsValue)> {
    if let Some(target) = option(options, "target", context)? {
        let id = chart_id(&target, context)
            .filter(|id| state.borrow().chart(*id).is_some())
            .ok_or_else(|| JsNativeError::typ().with_message("target is not a chart"))?;
        return Ok((id, target));
    }
    let id = state.borrow().current_id();
    Ok((id, chart_handle(id, context).into()))
}

fn callable(value: &JsValue, what: &str) -> JsResult<JsObject> {
    value
        .as_callable()
        .cloned()
        .ok_or_else(|| JsNativeError::typ().with_message(format!("{} is not a function", what)).into())
}

/// Call `f(x)`, mapping a throw or a non-number result to `None`.
fn sample(f: &JsObject, x: f64, context: &mut Context) -> Option<f64> {
    f.call(&JsValue::undefined(), &[JsValue::from(x)], context)
        .ok()?
        .as_number()
}

fn new_plot(
    state: &Rc<RefCell<ExecutionContext>>,
    args: &[JsValue],
    context: &mut Context,
) -> JsResult<JsValue> {
    let title = match args.get_or_undefined(0) {
        v if v.is_undefined() => chart::DEFAULT_TITLE.to_string(),
        v => v.to_string(context)?.to_std_string_escaped(),
    };
    let width = number_arg(args, 1, chart::DEFAULT_WIDTH as f64, context)?;
    let height = number_arg(args, 2, chart::DEFAULT_HEIGHT as f64, context)?;
    let options = match args.get_or_undefined(3) {
        v if v.is_object() => match v.to_json(context)? {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        },
        _ => serde_json::Map::new(),
    };

    let chart = Chart::new(title, dimension(width)?, dimension(height)?).with_options(options);
    let id = state.borrow_mut().push_chart(chart);
    let handle = chart_handle(id, context);
    bind_default_chart(&handle, context)?;
    Ok(handle.into())
}

fn dimension(value: f64) -> JsResult<u32> {
    if value.is_finite() && value >= 1.0 && value <= 10_000.0 {
        Ok(value as u32)
    } else {
        Err(JsNativeError::range()
            .with_message(format!("invalid chart dimension: {}", value))
            .into())
    }
}

fn plot_function(
    state: &Rc<RefCell<ExecutionContext>>,
    args: &[JsValue],
    context: &mut Context,
) -> JsResult<JsValue> {
    let f = callable(args.get_or_undefined(0), "plot_function argument")?;
    let start = number_arg(args, 1, chart::DEFAULT_RANGE.0, context)?;
    let end = number_arg(args, 2, chart::DEFAULT_RANGE.1, context)?;
    let num = sample_count(args, 3, context)?;
    let options = args.get_or_undefined(4);
    let (id, handle) = target_chart(state, options, context)?;
    let color = string_option(options, "color", chart::FUNCTION_COLOR, context)?;
    let line_width = number_option(options, "line_width", chart::LINE_WIDTH, context)?;
    let legend = legend_option(options, context)?;

    let (x, y) = chart::sample_function(start, end, num, |x| sample(&f, x, context));

    state.borrow_mut().draw(
        id,
        Renderer::Line {
            x,
            y,
            color,
            line_width,
            legend,
        },
    )?;
    Ok(handle)
}

fn plot_points(
    state: &Rc<RefCell<ExecutionContext>>,
    args: &[JsValue],
    context: &mut Context,
) -> JsResult<JsValue> {
    let x = numeric::to_numbers(args.get_or_undefined(0), context)?;
    let y = numeric::to_numbers(args.get_or_undefined(1), context)?;
    if x.len() != y.len() {
        return Err(JsNativeError::range()
            .with_message(format!(
                "x and y must have the same length ({} != {})",
                x.len(),
                y.len()
            ))
            .into());
    }
    let options = args.get_or_undefined(2);
    let (id, handle) = target_chart(state, options, context)?;
    let marker = Marker::from_name(&string_option(options, "marker", "circle", context)?);
    let size = number_option(options, "size", chart::POINT_SIZE, context)?;
    let color = string_option(options, "color", chart::POINTS_COLOR, context)?;
    let legend = legend_option(options, context)?;

    state.borrow_mut().draw(
        id,
        Renderer::Scatter {
            marker,
            x,
            y,
            size,
            color,
            legend,
        },
    )?;
    Ok(handle)
}

fn plot_parametric(
    state: &Rc<RefCell<ExecutionContext>>,
    args: &[JsValue],
    context: &mut Context,
) -> JsResult<JsValue> {
    let fx = callable(args.get_or_undefined(0), "plot_parametric x argument")?;
    let fy = callable(args.get_or_undefined(1), "plot_parametric y argument")?;
    let start = number_arg(args, 2, chart::DEFAULT_RANGE.0, context)?;
    let end = number_arg(args, 3, chart::DEFAULT_RANGE.1, context)?;
    let num = sample_count(args, 4, context)?;
    let options = args.get_or_undefined(5);
    let (id, handle) = target_chart(state, options, context)?;
    let color = string_option(options, "color", chart::PARAMETRIC_COLOR, context)?;
    let line_width = number_option(options, "line_width", chart::LINE_WIDTH, context)?;
    let legend = legend_option(options, context)?;

    let (x, y) = chart::sample_parametric(start, end, num, |t| {
        let x = sample(&fx, t, context)?;
        Some((x, sample(&fy, t, context)?))
    });

    state.borrow_mut().draw(
        id,
        Renderer::Line {
            x,
            y,
            color,
            line_width,
            legend,
        },
    )?;
    Ok(handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> Environment {
        Environment::new(&EnvironmentOptions::default()).unwrap()
    }

    fn eval_string(env: &mut Environment, code: &str) -> String {
        env.lookup(code)
            .and_then(|v| v.as_string().map(|s| s.to_std_string_escaped()))
            .unwrap()
    }

    #[test]
    fn test_print_is_captured() {
        let mut env = env();
        env.execute(r#"print("hello", 1 + 1); console.log([1, 2]); console.error("oops");"#)
            .unwrap();
        let (stdout, stderr) = env.take_output();
        assert_eq!(stdout, "hello 2\n[1,2]\n");
        assert_eq!(stderr, "oops\n");
    }

    #[test]
    fn test_forbidden_globals_removed() {
        let mut env = env();
        for name in ["eval", "Function", "Reflect", "Proxy", "Promise", "WeakRef"] {
            let kind = eval_string(&mut env, &format!("typeof {}", name));
            assert_eq!(kind, "undefined", "{} should be pruned", name);
        }
        assert_eq!(eval_string(&mut env, "typeof Math.sin"), "function");
        assert_eq!(eval_string(&mut env, "typeof np.linspace"), "function");
        assert_eq!(eval_string(&mut env, "typeof plot_function"), "function");
    }

    #[test]
    fn test_imports_denied() {
        let mut env = env();
        assert!(env.execute("import fs from 'fs';").is_err());
        // Dynamic import yields a rejected promise at best; nothing is loaded.
        let _ = env.execute("var loaded = import('fs');");
        assert!(env.state().stdout().is_empty());
    }

    #[test]
    fn test_fault_message() {
        let mut env = env();
        let fault = env.execute("print('before'); throw new Error('bad input');").unwrap_err();
        assert!(fault.contains("bad input"));
        assert_eq!(env.state().stdout(), "before\n");
    }

    #[test]
    fn test_plot_function_marks_failed_samples() {
        let mut env = env();
        env.execute(
            r#"plot_function(function (x) {
                if (Math.abs(x) < 0.03) { throw new Error("singular"); }
                return 1 / x;
            }, -10, 10, 400);"#,
        )
        .unwrap();

        let state = env.state();
        let chart = state.current_chart();
        let Renderer::Line { x, y, .. } = &chart.renderers[0] else {
            panic!("expected a line");
        };
        assert_eq!(x.len(), 400);
        let missing: Vec<usize> = y
            .iter()
            .enumerate()
            .filter(|(_, v)| v.is_nan())
            .map(|(i, _)| i)
            .collect();
        assert_eq!(missing, vec![199, 200]);
        assert!(y[0].is_finite() && y[399].is_finite());
    }

    #[test]
    fn test_non_number_samples_become_nan() {
        let mut env = env();
        env.execute(r#"plot_function(function (x) { return x > 0 ? "yes" : x; }, -1, 1, 3);"#)
            .unwrap();
        let state = env.state();
        let Renderer::Line { y, .. } = &state.current_chart().renderers[0] else {
            panic!("expected a line");
        };
        assert_eq!(y[0], -1.0);
        assert_eq!(y[1], 0.0);
        assert!(y[2].is_nan());
    }

    #[test]
    fn test_new_plot_becomes_default() {
        let mut env = env();
        env.execute(
            r#"const fig = new_plot("Parabola", 800, 300, { background: "white" });
               plot_points([1, 2, 3], [1, 4, 9], { marker: "teapot", legend: "pts" });"#,
        )
        .unwrap();

        let state = env.state();
        assert_eq!(state.current_id(), 1);
        assert!(!state.chart(0).unwrap().has_renderers());
        let chart = state.current_chart();
        assert_eq!(chart.title, "Parabola");
        assert_eq!(chart.width, 800);
        assert_eq!(chart.options["background"], "white");
        let Renderer::Scatter { marker, legend, .. } = &chart.renderers[0] else {
            panic!("expected a scatter");
        };
        assert_eq!(*marker, Marker::Circle);
        assert_eq!(legend.as_deref(), Some("pts"));
    }

    #[test]
    fn test_explicit_target() {
        let mut env = env();
        env.execute(
            r#"const first = new_plot("A");
               const second = new_plot("B");
               plot_parametric(Math.cos, Math.sin, 0, 6.3, 50, { target: first });"#,
        )
        .unwrap();

        let state = env.state();
        assert!(state.chart(1).unwrap().has_renderers());
        assert!(!state.chart(2).unwrap().has_renderers());
    }

    #[test]
    fn test_bad_target_throws() {
        let mut env = env();
        let fault = env
            .execute("plot_function(Math.sin, -1, 1, 10, { target: 42 });")
            .unwrap_err();
        assert!(fault.contains("not a chart"));
    }

    #[test]
    fn test_mismatched_points_throw() {
        let mut env = env();
        assert!(env.execute("plot_points([1, 2], [1]);").is_err());
    }

    #[test]
    fn test_output_cap() {
        let mut buffer = String::new();
        append_capped(&mut buffer, &"x".repeat(MAX_OUTPUT_BYTES - 2));
        append_capped(&mut buffer, "yyyy");
        assert!(buffer.ends_with(TRUNCATION_MARKER));
        let len = buffer.len();
        append_capped(&mut buffer, "zzz");
        assert_eq!(buffer.len(), len);
    }

    #[test]
    fn test_environments_are_independent() {
        let mut a = env();
        let mut b = env();
        a.execute("print('a'); plot_function(Math.sin);").unwrap();
        b.execute("print('b');").unwrap();
        assert_eq!(a.state().stdout(), "a\n");
        assert_eq!(b.state().stdout(), "b\n");
        assert!(a.state().current_chart().has_renderers());
        assert!(!b.state().current_chart().has_renderers());
    }

    #[test]
    fn test_oversized_sample_count_is_a_range_error() {
        let mut env = env();
        let fault = env
            .execute("print('start'); plot_function(x => x, -10, 10, 1000000);")
            .unwrap_err();
        assert!(fault.contains("RangeError"), "{}", fault);
        assert!(fault.contains("invalid sample count"));
        assert_eq!(env.state().stdout(), "start\n");
        assert!(!env.state().current_chart().has_renderers());
    }

    #[test]
    fn test_chart_point_limit_across_calls() {
        let mut env = env();
        let half = chart::MAX_CHART_POINTS / 2;
        env.execute(&format!(
            "const xs = np.linspace(0, 1, {n}); plot_points(xs, xs); plot_points(xs, xs);",
            n = half
        ))
        .unwrap();
        assert_eq!(env.state().current_chart().point_count(), chart::MAX_CHART_POINTS);

        let fault = env.execute("plot_points([1], [1]);").unwrap_err();
        assert!(fault.contains("RangeError"), "{}", fault);
        assert!(fault.contains("point limit"));

        // A fresh chart has its own allowance.
        env.execute("new_plot('Next'); plot_points([1], [1]);").unwrap();
        assert_eq!(env.state().current_chart().point_count(), 1);
    }

    #[test]
    fn test_parametric_stops_at_first_failed_coordinate() {
        let mut env = env();
        env.execute(
            r#"var y_calls = 0;
               plot_parametric(
                   function (t) { if (t === 1) { throw new Error("x"); } return t; },
                   function (t) { y_calls += 1; return -t; },
                   0, 2, 3);"#,
        )
        .unwrap();
        assert_eq!(eval_string(&mut env, "String(y_calls)"), "2");
        let state = env.state();
        let Renderer::Line { x, y, .. } = &state.current_chart().renderers[0] else {
            panic!("expected a line");
        };
        assert_eq!(x[0], 0.0);
        assert!(x[1].is_nan() && y[1].is_nan());
        assert_eq!(y[2], -2.0);
    }
}
