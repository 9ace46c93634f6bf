//! Numeric helpers exposed to scripts as `np`, `numpy` and `math`.

use crate::chart;
use boa_engine::object::builtins::JsArray;
use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{
    js_string, Context, JsArgs, JsNativeError, JsObject, JsResult, JsString, JsValue,
    NativeFunction,
};

/// Default sample count of `np.linspace`.
const LINSPACE_DEFAULT: usize = 50;

/// Upper bound on arrays built from a requested length.
const MAX_LENGTH: usize = 10_000_000;

/// Element-wise scalar functions, shared by `np` and `math`.
const ELEMENTWISE: &[(&str, fn(f64) -> f64)] = &[
    ("sin", f64::sin),
    ("cos", f64::cos),
    ("tan", f64::tan),
    ("exp", f64::exp),
    ("log", f64::ln),
    ("sqrt", f64::sqrt),
    ("abs", f64::abs),
];

/// Array constructors and reductions, `np` only.
const ARRAY_FUNCTIONS: &[(&str, usize, fn(&JsValue, &[JsValue], &mut Context) -> JsResult<JsValue>)] = &[
    ("linspace", 3, linspace),
    ("arange", 3, arange),
    ("zeros", 1, zeros),
    ("ones", 1, ones),
    ("sum", 1, sum),
    ("mean", 1, mean),
    ("std", 1, std_dev),
    ("min", 1, min),
    ("max", 1, max),
];

/// Build the `np` namespace object.
pub(crate) fn numpy_namespace(context: &mut Context) -> JsObject {
    namespace(context, true)
}

/// Build the `math` namespace object.
pub(crate) fn math_namespace(context: &mut Context) -> JsObject {
    namespace(context, false)
}

fn namespace(context: &mut Context, with_arrays: bool) -> JsObject {
    let mut init = ObjectInitializer::new(context);
    init.property(js_string!("pi"), std::f64::consts::PI, Attribute::READONLY)
        .property(js_string!("e"), std::f64::consts::E, Attribute::READONLY);

    for &(name, op) in ELEMENTWISE {
        let function =
            NativeFunction::from_copy_closure(move |_, args, ctx| elementwise(args, op, ctx));
        init.function(function, JsString::from(name), 1);
    }

    if with_arrays {
        for &(name, length, f) in ARRAY_FUNCTIONS {
            init.function(NativeFunction::from_fn_ptr(f), JsString::from(name), length);
        }
    }

    init.build()
}

/// Read a number or an array-like of numbers.
pub(crate) fn to_numbers(value: &JsValue, context: &mut Context) -> JsResult<Vec<f64>> {
    let Some(object) = value.as_object() else {
        return Ok(vec![value.to_number(context)?]);
    };
    if object.is_callable() {
        return Err(JsNativeError::typ()
            .with_message("expected a number or an array of numbers")
            .into());
    }

    let length = object.get(js_string!("length"), context)?.to_length(context)?;
    let length = checked_length(length as f64)?;
    let mut numbers = Vec::with_capacity(length);
    for i in 0..length {
        numbers.push(object.get(i as u32, context)?.to_number(context)?);
    }
    Ok(numbers)
}

/// Build a script array from numbers.
pub(crate) fn from_numbers(numbers: Vec<f64>, context: &mut Context) -> JsValue {
    JsArray::from_iter(numbers.into_iter().map(JsValue::from), context).into()
}

fn checked_length(n: f64) -> JsResult<usize> {
    if n.is_nan() || n < 0.0 || n > MAX_LENGTH as f64 {
        return Err(JsNativeError::range()
            .with_message(format!("invalid array length: {}", n))
            .into());
    }
    Ok(n as usize)
}

fn elementwise(args: &[JsValue], op: fn(f64) -> f64, context: &mut Context) -> JsResult<JsValue> {
    let value = args.get_or_undefined(0);
    if value.is_object() {
        let mapped = to_numbers(value, context)?.into_iter().map(op).collect();
        Ok(from_numbers(mapped, context))
    } else {
        Ok(JsValue::from(op(value.to_number(context)?)))
    }
}

fn number_arg(args: &[JsValue], index: usize, default: f64, context: &mut Context) -> JsResult<f64> {
    match args.get(index) {
        Some(value) if !value.is_undefined() => value.to_number(context),
        _ => Ok(default),
    }
}

fn linspace(_: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let start = args.get_or_undefined(0).to_number(context)?;
    let end = args.get_or_undefined(1).to_number(context)?;
    let num = checked_length(number_arg(args, 2, LINSPACE_DEFAULT as f64, context)?)?;
    Ok(from_numbers(chart::linspace(start, end, num), context))
}

fn arange(_: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let first = args.get_or_undefined(0).to_number(context)?;
    let (start, stop) = match args.get(1) {
        Some(value) if !value.is_undefined() => (first, value.to_number(context)?),
        _ => (0.0, first),
    };
    let step = number_arg(args, 2, 1.0, context)?;
    let values = arange_values(start, stop, step).ok_or_else(|| {
        JsNativeError::range().with_message("arange needs a finite, non-zero step and bounds")
    })?;
    Ok(from_numbers(values, context))
}

fn filled(args: &[JsValue], value: f64, context: &mut Context) -> JsResult<JsValue> {
    let n = checked_length(args.get_or_undefined(0).to_number(context)?)?;
    Ok(from_numbers(vec![value; n], context))
}

fn zeros(_: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    filled(args, 0.0, context)
}

fn ones(_: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    filled(args, 1.0, context)
}

fn sum(_: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let values = to_numbers(args.get_or_undefined(0), context)?;
    Ok(JsValue::from(values.iter().sum::<f64>()))
}

fn mean(_: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let values = to_numbers(args.get_or_undefined(0), context)?;
    Ok(JsValue::from(mean_of(&values)))
}

fn std_dev(_: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let values = to_numbers(args.get_or_undefined(0), context)?;
    Ok(JsValue::from(std_of(&values)))
}

fn min(_: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    reduce(args, f64::min, context)
}

fn max(_: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    reduce(args, f64::max, context)
}

fn reduce(args: &[JsValue], op: fn(f64, f64) -> f64, context: &mut Context) -> JsResult<JsValue> {
    let values = to_numbers(args.get_or_undefined(0), context)?;
    // A NaN anywhere poisons the result, as it does for array reductions elsewhere.
    if values.iter().any(|v| v.is_nan()) {
        return Ok(JsValue::from(f64::NAN));
    }
    values
        .into_iter()
        .reduce(op)
        .map(JsValue::from)
        .ok_or_else(|| {
            JsNativeError::range()
                .with_message("reduction of an empty array")
                .into()
        })
}

fn arange_values(start: f64, stop: f64, step: f64) -> Option<Vec<f64>> {
    if !(start.is_finite() && stop.is_finite() && step.is_finite()) || step == 0.0 {
        return None;
    }
    let count = ((stop - start) / step).ceil();
    if count <= 0.0 {
        return Some(Vec::new());
    }
    if count > MAX_LENGTH as f64 {
        return None;
    }
    Some((0..count as usize).map(|i| start + step * i as f64).collect())
}

fn mean_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
fn std_of(values: &[f64]) -> f64 {
    let mean = mean_of(values);
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}
