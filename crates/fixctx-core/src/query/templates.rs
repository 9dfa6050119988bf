//! Whole-database query texts.
//!
//! No query takes a per-function parameter: every text answers its question
//! for every function in the database at once, so the handle's result cache
//! serves all later rewrites. Each select starts with the enclosing function's
//! `(relative path, absolute path, start line)`; the payload columns that
//! follow are documented per query.

/// Payload: access line, declaring enum, value, constant.
pub const ENUM_CONSTANT_QUERY: &str = r#"
import cpp

from File file, Function func, EnumConstant const, EnumConstantAccess acc
where func.getFile() = file
and const.getAnAccess() = acc
and acc.getEnclosingFunction() = func
and not exists(EnumConstantAccess prev_acc |
    prev_acc.getEnclosingFunction() = func and
    prev_acc.getLocation().getStartLine() < acc.getLocation().getStartLine()
    and prev_acc.getTarget() = acc.getTarget()
)
select file.getRelativePath(),
       file.getAbsolutePath(),
       func.getLocation().getStartLine(),
       acc.getLocation().getStartLine(),
       const.getDeclaringEnum(),
       const.getValue(),
       const
"#;

/// Payload: access line, macro name, macro body, defining file.
///
/// `{MACRO_BODY_LIMIT}` is replaced with the configured body length limit.
pub const SHORT_MACRO_QUERY_TEMPLATE: &str = r#"
import cpp

from
    File file,
    Function func,
    Macro macro,
    MacroAccess acc
where
    func.getFile() = file
    and acc.getFile() = file
    and acc.getLocation().getStartLine() > func.getLocation().getStartLine()
    and acc.getLocation().getEndLine() < func.getBlock().getLastStmt().getLocation().getEndLine()
    and acc.getMacro() = macro
    and macro.getBody().length() < {MACRO_BODY_LIMIT}
    and not exists(MacroAccess prev_acc |
        prev_acc.getLocation().getStartLine() > func.getLocation().getStartLine()
        and prev_acc.getLocation().getStartLine() < acc.getLocation().getStartLine()
        and prev_acc.getMacro() = acc.getMacro()
    )
select
    file.getRelativePath(),
    file.getAbsolutePath(),
    func.getLocation().getStartLine(),
    acc.getLocation().getStartLine(),
    macro.getName(),
    macro.getBody(),
    macro.getFile().getRelativePath()
"#;

pub fn short_macro_query(body_limit: usize) -> String {
    SHORT_MACRO_QUERY_TEMPLATE.replace("{MACRO_BODY_LIMIT}", &body_limit.to_string())
}

/// Payload: use line, type name, resolved integral type name.
pub const INTEGRAL_TYPEDEF_QUERY: &str = r#"
import cpp

from
    File file,
    Function func,
    Type type,
    string typename,
    string resolved_typename,
    Element element
where
    func.getFile() = file
    and element = type.getATypeNameUse()
    and element.getFile() = file
    and element.getLocation().getStartLine() > func.getLocation().getStartLine()
    and element.getLocation().getEndLine() < func.getBlock().getLastStmt().getLocation().getEndLine()
    and type.getName() = typename
    and type.resolveTypedefs().(IntegralType).getName() = resolved_typename
    and typename != resolved_typename
    and not resolved_typename.matches("%unnamed%")
    and not resolved_typename.matches("%.%")
    and not exists(Element prev_element, Type other_type |
        prev_element.getLocation().getStartLine() > func.getLocation().getStartLine()
        and prev_element.getLocation().getStartLine() < element.getLocation().getStartLine()
        and prev_element = other_type.getATypeNameUse()
        and other_type.getName() = typename
        and other_type.resolveTypedefs().getName() = resolved_typename
    )
select
    file.getRelativePath(),
    file.getAbsolutePath(),
    func.getLocation().getStartLine(),
    element.getLocation().getStartLine(),
    typename,
    resolved_typename
"#;

/// Payload: variable, underlying type, assigned value, first access line.
pub const GLOBAL_VARIABLE_QUERY: &str = r#"
import cpp

from File file,
     Function func,
     GlobalVariable var,
     VariableAccess acc,
     Expr assigned,
     string value
where
func.getFile() = file
and var.getAnAccess() = acc
and acc.getEnclosingFunction() = func
and var.getAnAssignedValue() = assigned
and if exists(assigned.getValue())
    then value = assigned.getValue()
    else value = assigned.toString()
and not exists(VariableAccess prev_acc |
    prev_acc.getEnclosingFunction() = func and
    prev_acc.getLocation().getStartLine() < acc.getLocation().getStartLine()
    and prev_acc.getTarget() = acc.getTarget()
)
select file.getRelativePath(),
       file.getAbsolutePath(),
       func.getLocation().getStartLine(),
       var,
       var.getUnderlyingType(),
       value,
       acc.getLocation().getStartLine()
"#;

/// Value reported for an argument the engine cannot evaluate statically.
pub const UNKNOWN_ARGUMENT: &str = "<null>";

/// Payload: parameter index, argument value or `<null>`, parameter end line,
/// parameter end column.
pub const NEGATIVE_TAINT_QUERY: &str = r#"
import cpp

from File file,
     Function func,
     Parameter param,
     int paramIdx,
     Expr arg,
     Call call,
     string value
where
func.getFile() = file and
func.getAParameter() = param and
param.getIndex() = paramIdx and
func.getACallToThisFunction() = call and
call.getArgument(paramIdx) = arg and
(
    if exists(arg.getValue())
     then value = arg.getValue().toString()
    else value = "<null>"
)
select
    file.getRelativePath(),
    file.getAbsolutePath(),
    func.getLocation().getStartLine(),
    paramIdx,
    value,
    param.getLocation().getEndLine(),
    param.getLocation().getEndColumn()
"#;

/// Payload: source description, parameter end line, parameter end column.
pub const REMOTE_SOURCE_FLOW_QUERY: &str = r#"
import cpp
import semmle.code.cpp.dataflow.new.DataFlow
import semmle.code.cpp.security.FlowSources as FlowSources

module TaintedParametersConfig implements DataFlow::ConfigSig {
  predicate isSource(DataFlow::Node source) {
    source instanceof FlowSources::RemoteFlowSource
  }
  predicate isSink(DataFlow::Node sink) {
    exists(sink.asParameter())
  }
}
module TaintedParametersFlow = DataFlow::Global<TaintedParametersConfig>;

from
  File file,
  Function func,
  DataFlow::Node source,
  DataFlow::Node sink
where
  func.getFile() = file
  and func.getAParameter() = sink.asParameter()
  and TaintedParametersFlow::flow(source, sink)
select
  file.getRelativePath(),
  file.getAbsolutePath(),
  func.getLocation().getStartLine(),
  source.toString(),
  sink.asParameter().getLocation().getEndLine(),
  sink.asParameter().getLocation().getEndColumn()
"#;

/// Caller `(relative path, absolute path, start line)` followed by the callee's
/// relative path, absolute path, start line, and the end line of its body
/// block (the closing brace), so that `[start, end]` covers the whole
/// definition.
pub const CALL_GRAPH_QUERY: &str = r#"
import cpp

from
    Function included,
    Function candidate
where
    included.calls(candidate)
    and candidate.getFile().getAbsolutePath().length() != 0
    and exists(candidate.getBlock())
select
    included.getFile().getRelativePath(),
    included.getFile().getAbsolutePath(),
    included.getLocation().getStartLine(),
    candidate.getFile().getRelativePath(),
    candidate.getFile().getAbsolutePath(),
    candidate.getLocation().getStartLine(),
    candidate.getBlock().getLocation().getEndLine()
"#;
