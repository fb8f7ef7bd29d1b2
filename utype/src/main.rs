use std::process;

use clap::{Parser, ValueEnum};
use log::info;

use utype::{
    Action, ActionRequest, CompareMode, HeapCreateInfo, Interpreter, InterpreterCreateInfo,
    RuntimeError, RuntimeResult, Symbol, TypeTag, Value,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    Arith,
    Clone,
    Derive,
    Merge,
    Copy,
    Reflect,
    All,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Runs utype! scenarios against a fresh interpreter", long_about = None)]
struct Cli {
    /// Scenario to run
    #[arg(long, value_enum, default_value_t = Scenario::All)]
    scenario: Scenario,

    /// Collect before every allocation
    #[arg(long, help = "Run the collector before every allocation")]
    stress_gc: bool,

    /// Allocations between collections
    #[arg(long)]
    gc_threshold: Option<usize>,

    /// env_logger filter, e.g. `debug` or `utype=trace`
    #[arg(long, default_value = "warn")]
    log_level: String,
}

/// Demo values live for the whole run.
fn keep(interp: &mut Interpreter, value: Value) -> Value {
    interp.heap.pin(value);
    value
}

fn block(interp: &mut Interpreter, values: Vec<Value>) -> Value {
    let block = interp.make_block(values);
    keep(interp, block)
}

fn coords(interp: &Interpreter, value: Value) -> RuntimeResult<(i64, i64)> {
    match value {
        Value::Integer(n) => Ok((n, n)),
        _ => Ok((
            Interpreter::integer(interp.member(value, "x")?)?,
            Interpreter::integer(interp.member(value, "y")?)?,
        )),
    }
}

fn point_add(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    let (ax, ay) = coords(interp, args[0])?;
    let (bx, by) = coords(interp, args[1])?;
    let proto = if args[0].is_utype() { args[0] } else { args[1] };
    let sum = interp.make(proto, Value::None)?;
    interp.set_member(sum, "x", Value::Integer(ax + bx))?;
    interp.set_member(sum, "y", Value::Integer(ay + by))?;
    Ok(sum)
}

fn point_form(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    let (x, y) = coords(interp, args[0])?;
    Ok(interp.make_string(&format!("{x}x{y}")))
}

fn point_compare(interp: &mut Interpreter, args: &[Value]) -> RuntimeResult<Value> {
    let mode = CompareMode::from_code(Interpreter::integer(args[2])?);
    if !(args[0].is_utype() && args[1].is_utype()) {
        return Ok(Value::Logic(false));
    }
    let (a, b) = (coords(interp, args[0])?, coords(interp, args[1])?);
    Ok(Value::Logic(match mode {
        Some(CompareMode::Greater) => a > b,
        Some(CompareMode::GreaterOrEqual) => a >= b,
        _ => a == b,
    }))
}

/// `make utype! [x: 0 y: 0 .add: :point-add ...]`
fn point_type(interp: &mut Interpreter) -> RuntimeResult<Value> {
    interp.define_native("point-add", 2, std::rc::Rc::new(point_add));
    interp.define_native("point-form", 1, std::rc::Rc::new(point_form));
    interp.define_native("point-compare", 3, std::rc::Rc::new(point_compare));

    let words = ["x", "y", ".add", ".form", ".compare"].map(|name| interp.intern(name));
    let hooks = ["point-add", "point-form", "point-compare"].map(|name| interp.intern(name));
    let decls = block(
        interp,
        vec![
            Value::SetWord(words[0]),
            Value::Integer(0),
            Value::SetWord(words[1]),
            Value::Integer(0),
            Value::SetWord(words[2]),
            Value::GetWord(hooks[0]),
            Value::SetWord(words[3]),
            Value::GetWord(hooks[1]),
            Value::SetWord(words[4]),
            Value::GetWord(hooks[2]),
        ],
    );
    let point = interp.make(Value::Datatype(TypeTag::Utype), decls)?;
    Ok(keep(interp, point))
}

fn point_at(interp: &mut Interpreter, proto: Value, x: i64, y: i64) -> RuntimeResult<Value> {
    let point = interp.make(proto, Value::None)?;
    let point = keep(interp, point);
    interp.set_member(point, "x", Value::Integer(x))?;
    interp.set_member(point, "y", Value::Integer(y))?;
    Ok(point)
}

fn arith(interp: &mut Interpreter) -> RuntimeResult<()> {
    let proto = point_type(interp)?;
    let p = point_at(interp, proto, 1, 2)?;
    let q = point_at(interp, proto, 10, 20)?;

    let sum = interp.act(Action::Add, &[p, q])?;
    let sum = keep(interp, sum);
    println!("{} + {} = {}", interp.form(p)?, interp.form(q)?, interp.form(sum)?);

    let shifted = interp.act(Action::Add, &[Value::Integer(5), p])?;
    let shifted = keep(interp, shifted);
    println!("5 + {} = {}", interp.form(p)?, interp.form(shifted)?);

    let copy = point_at(interp, proto, 1, 2)?;
    println!(
        "equal? {} {} = {}, same? = {}",
        interp.form(p)?,
        interp.form(copy)?,
        interp.compare(p, copy, CompareMode::Equal)?,
        interp.compare(p, copy, CompareMode::Same)?
    );

    match interp.act(Action::Append, &[p, Value::Integer(1)]) {
        Err(err @ RuntimeError::ActionNotSupported { .. }) => println!("append: {err}"),
        other => return Err(RuntimeError::User(format!("append should fail, got {other:?}"))),
    }
    Ok(())
}

fn clone(interp: &mut Interpreter) -> RuntimeResult<()> {
    let proto = point_type(interp)?;
    let p = point_at(interp, proto, 3, 4)?;
    let q = interp.make(p, Value::None)?;
    let q = keep(interp, q);
    interp.set_member(q, "x", Value::Integer(99))?;
    println!("original {} clone {}", interp.form(p)?, interp.form(q)?);
    Ok(())
}

fn derive(interp: &mut Interpreter) -> RuntimeResult<()> {
    let proto = point_type(interp)?;
    let z = interp.intern("z");
    let decls = block(interp, vec![Value::SetWord(z), Value::Integer(7)]);
    let derived = interp.make(proto, decls)?;
    let derived = keep(interp, derived);
    interp.set_member(proto, "x", Value::Integer(-1))?;
    let words = interp.reflect(derived, "words")?;
    let x = interp.member(derived, "x")?;
    println!("derived words {} x={}", interp.form(words)?, interp.form(x)?);
    Ok(())
}

fn merge(interp: &mut Interpreter) -> RuntimeResult<()> {
    let proto = point_type(interp)?;
    let a = point_at(interp, proto, 1, 1)?;
    let label = interp.intern("label");
    let x = interp.intern("x");
    let text = interp.make_string("b");
    let text = keep(interp, text);
    let decls = block(
        interp,
        vec![Value::SetWord(x), Value::Integer(50), Value::SetWord(label), text],
    );
    let b = interp.make(Value::Datatype(TypeTag::Utype), decls)?;
    let b = keep(interp, b);
    let merged = interp.make(a, b)?;
    let merged = keep(interp, merged);
    let body = interp.reflect(merged, "body")?;
    let body = keep(interp, body);
    println!("merged {}", interp.form(body)?);
    Ok(())
}

fn copy(interp: &mut Interpreter) -> RuntimeResult<()> {
    let items = interp.intern("items");
    let inner = block(interp, vec![Value::Integer(1), Value::Integer(2)]);
    let decls = block(interp, vec![Value::SetWord(items), inner]);
    let bag = interp.make(Value::Datatype(TypeTag::Utype), decls)?;
    let bag = keep(interp, bag);

    let shallow = interp.copy(bag)?;
    let shallow = keep(interp, shallow);
    let deep = interp.dispatch(ActionRequest::new(Action::Copy, vec![bag]).refine(Symbol::DEEP, None))?;
    let deep = keep(interp, deep);
    println!(
        "shallow shares items: {}, deep shares items: {}",
        interp.member(shallow, "items")? == interp.member(bag, "items")?,
        interp.member(deep, "items")? == interp.member(bag, "items")?
    );

    let part = ActionRequest::new(Action::Copy, vec![bag]).refine(Symbol::PART, Some(Value::Integer(1)));
    match interp.dispatch(part) {
        Err(err) => println!("copy/part: {err}"),
        Ok(value) => return Err(RuntimeError::User(format!("copy/part should fail, got {value:?}"))),
    }
    Ok(())
}

fn reflect(interp: &mut Interpreter) -> RuntimeResult<()> {
    let proto = point_type(interp)?;
    let spec = interp.reflect(proto, "spec")?;
    println!("spec: {}", interp.form(spec)?);
    for selector in ["words", "values", "body"] {
        let view = interp.reflect(proto, selector)?;
        let view = keep(interp, view);
        println!("{selector}: {}", interp.form(view)?);
    }
    if let Err(err) = interp.reflect(proto, "title") {
        println!("title: {err}");
    }
    Ok(())
}

fn run(scenario: Scenario, info: &InterpreterCreateInfo) -> RuntimeResult<()> {
    let scenarios: &[(Scenario, fn(&mut Interpreter) -> RuntimeResult<()>)] = &[
        (Scenario::Arith, arith),
        (Scenario::Clone, clone),
        (Scenario::Derive, derive),
        (Scenario::Merge, merge),
        (Scenario::Copy, copy),
        (Scenario::Reflect, reflect),
    ];
    for (name, func) in scenarios {
        if scenario != Scenario::All && scenario != *name {
            continue;
        }
        println!("== {name:?} ==");
        let mut interp = Interpreter::new(info.clone());
        func(&mut interp)?;
        info!("{:?}: {:?}", name, interp.heap.stats());
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    env_logger::Builder::new()
        .parse_filters(&cli.log_level)
        .init();

    let info = InterpreterCreateInfo {
        heap: HeapCreateInfo {
            gc_threshold: cli.gc_threshold,
            stress: Some(cli.stress_gc),
            ..Default::default()
        },
    };

    if let Err(err) = run(cli.scenario, &info) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}
