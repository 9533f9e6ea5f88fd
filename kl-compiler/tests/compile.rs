use kl_compiler::{preprocess, CompileCtx};
use kl_types::TypeCheckMode;
use rstest::rstest;

fn compile(source: &str) -> Result<String, String> {
    let ast = kl_syntax::parse(source).map_err(|e| e.to_string())?;
    let ast = preprocess(&ast).map_err(|e| e.to_string())?;
    let mut ctx = CompileCtx::new("test.kl", false, TypeCheckMode::Loose);
    ctx.set_source(source);
    ctx.compile(&ast).map_err(|e| e.to_string())
}

#[test]
fn empty_function_emits_prologue_and_epilogue() {
    let asm = compile("(fn void main ())").unwrap();
    assert!(asm.contains(".export #main"));
    assert!(asm.contains("#main:"));
    assert!(asm.contains("push $12"));
    assert!(asm.contains("mov $15 $12"));
    assert!(asm.contains("pop $12"));
    assert!(asm.contains("ret"));
}

#[test]
fn arithmetic_lowers_to_push_pop_sequence() {
    let asm = compile("(fn uint32 main () (return (+ 1 2)))").unwrap();
    assert!(asm.contains("movi 2 $1"));
    assert!(asm.contains("push $1"));
    assert!(asm.contains("movi 1 $1"));
    assert!(asm.contains("pop $2"));
    assert!(asm.contains("add $2 $1"));
}

#[test]
fn function_call_pushes_arguments_in_reverse_order() {
    let source = "(fn uint32 add (((uint32 a) (uint32 b))) (return (+ a b)))\n\
                   (fn uint32 main () (return (add 1 2)))";
    let asm = compile(source).unwrap();
    assert!(asm.contains("calli #add"));
    assert!(asm.matches("push $1").count() >= 2);
}

#[test]
fn undefined_function_is_an_error() {
    let err = compile("(fn void main () (nonexistent))").unwrap_err();
    assert!(err.contains("undefined function"));
}

#[test]
fn while_loop_uses_immediate_branch_mnemonics() {
    let source = "(fn void main () (local uint32 i 0) (while (< i 10) (set-var i (+ i 1))))";
    let asm = compile(source).unwrap();
    assert!(asm.contains("jfi #__while_"));
    assert!(asm.contains("ji #__while_"));
    assert!(!asm.contains("\nbf "));
    assert!(!asm.contains("\nb "));
    // `jfi` must branch on the flag `clt` just set, not re-test `$r`
    // (which holds the comparison's left operand, not a boolean result).
    assert!(!asm.contains("cnqi"));
}

#[test]
fn while_loop_unwinds_locals_declared_in_body() {
    let source = "(fn void main () (while (true) (local uint32 x 0)))";
    let asm = compile(source).unwrap();
    assert!(asm.contains("addi 4 $15"));
}

#[test]
fn struct_field_access_uses_byte_offset() {
    let source = "(struct point (uint32 x) (uint32 y))\n\
                   (fn uint32 main () (local uint32 p 0) (return (get point.y (addr p))))";
    let asm = compile(source).unwrap();
    assert!(asm.contains("addi 4 $1"));
}

#[test]
fn switch_falls_through_to_end_after_matched_case() {
    let source = "(fn void main () (local uint32 x 1) \
                    (switch x (1 (return)) (2 (return))))";
    let asm = compile(source).unwrap();
    assert!(asm.contains("__switch_"));
    assert!(asm.contains("ceq"));
}

#[test]
fn bool_form_materializes_flag_into_register() {
    let asm = compile("(fn uint32 main () (return (bool (< 1 2))))").unwrap();
    assert!(asm.contains("mov $0 $1"));
    assert!(asm.contains("jfi #__bool_"));
    assert!(asm.contains("movi 1 $1"));
}

#[test]
fn true_and_false_set_hardware_flag_not_register() {
    let asm = compile("(fn uint8 main () (return (true)))").unwrap();
    assert!(asm.contains("ceq $0 $0"));
    assert!(!asm.contains("movi 1 $1"));

    let asm = compile("(fn uint8 main () (return (false)))").unwrap();
    assert!(asm.contains("cnq $0 $0"));
}

#[test]
fn duplicate_function_definition_is_rejected() {
    let source = "(fn void f ()) (fn void f ())";
    let err = compile(source).unwrap_err();
    assert!(err.contains("twice"));
}

#[test]
fn array_initializer_emits_one_directive_per_element() {
    let asm = compile("(array uint8 bytes (1 2 3))").unwrap();
    assert_eq!(asm.matches(".byte").count(), 3);
}

#[rstest]
#[case("+", "add")]
#[case("-", "sub")]
#[case("*", "mul")]
#[case("/", "div")]
#[case("&", "and")]
#[case("|", "or")]
#[case("<<", "shl")]
#[case(">>", "shr")]
fn binary_operator_lowers_to_its_opcode(#[case] op: &str, #[case] mnemonic: &str) {
    let source = format!("(fn uint32 main () (return ({op} 1 2)))");
    let asm = compile(&source).unwrap();
    assert!(asm.contains(&format!("{mnemonic} $2 $1")), "expected `{mnemonic} $2 $1` in:\n{asm}");
}

#[test]
fn loose_type_checking_widens_and_strict_rejects() {
    let source = "(fn uint32 main () (local uint8 a 1) (local uint32 b 2) (return (+ a b)))";
    assert!(compile(source).is_ok());

    let ast = kl_syntax::parse(source).unwrap();
    let ast = preprocess(&ast).unwrap();
    let mut ctx = CompileCtx::new("test.kl", false, TypeCheckMode::Strict);
    ctx.set_source(source);
    assert!(ctx.compile(&ast).is_err());
}
