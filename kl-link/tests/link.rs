use kl_link::Linker;

fn link_one(source: &str) -> Result<Vec<u8>, String> {
    let mut linker = Linker::new();
    linker.add_unit("test.s", source).map_err(|e| e.to_string())?;
    linker.finish().map_err(|e| e.to_string())
}

#[test]
fn label_reference_patches_to_its_own_position() {
    let code = link_one("ji #top\n#top:\nnop\n").unwrap();
    // `ji` is opcode 0x23 (I shape): one prefix byte then a 4-byte immediate.
    assert_eq!(code[0], 0x23);
    let target = u32::from_le_bytes(code[1..5].try_into().unwrap());
    assert_eq!(target, 5);
}

#[test]
fn byte_word_dword_directives_emit_exact_widths() {
    let code = link_one(".byte 1\n.word 2\n.dword 3\n").unwrap();
    assert_eq!(code.len(), 1 + 2 + 4);
    assert_eq!(code[0], 1);
    assert_eq!(u16::from_le_bytes(code[1..3].try_into().unwrap()), 2);
    assert_eq!(u32::from_le_bytes(code[3..7].try_into().unwrap()), 3);
}

#[test]
fn reloc_token_rebases_subsequent_labels() {
    let code = link_one("@RELOC:0x1000\n#here:\nnop\nji #here\n").unwrap();
    // the `nop` occupies one byte, so `ji`'s operand should read back 0x1000.
    let target = u32::from_le_bytes(code[2..6].try_into().unwrap());
    assert_eq!(target, 0x1000);
}

#[test]
fn undefined_local_symbol_is_rejected() {
    let err = link_one("ji #missing\n").unwrap_err();
    assert!(err.contains("missing"));
}

#[test]
fn cross_file_import_resolves_in_final_pass() {
    let mut linker = Linker::new();
    linker.add_unit("a.s", "calli #helper\n.import #helper\n").unwrap();
    linker.add_unit("b.s", "#helper:\nret\n.export #helper\n").unwrap();
    let code = linker.finish().unwrap();

    // `calli` is opcode 0x29 (I shape).
    assert_eq!(code[0], 0x29);
    let target = u32::from_le_bytes(code[1..5].try_into().unwrap());
    // `b.s`'s `#helper` label sits right after `a.s`'s 5-byte `calli`.
    assert_eq!(target, 5);
}

#[test]
fn duplicate_export_across_files_is_rejected() {
    let mut linker = Linker::new();
    linker.add_unit("a.s", "#dup:\nret\n.export #dup\n").unwrap();
    let err = linker.add_unit("b.s", "#dup:\nret\n.export #dup\n").unwrap_err();
    assert!(err.to_string().contains("dup"));
}

#[test]
fn define_macro_substitutes_before_parsing() {
    let code = link_one(".define FIVE 5\nmovi FIVE $1\n").unwrap();
    // `movi` is opcode [0x30, 0x10] (Ir shape): 2-byte prefix then immediate.
    let value = u32::from_le_bytes(code[2..6].try_into().unwrap());
    assert_eq!(value, 5);
}

#[test]
fn data_directive_repeat_count_emits_n_copies() {
    let code = link_one(".byte 7 3\n").unwrap();
    assert_eq!(code, vec![7, 7, 7]);
}

#[test]
fn character_literal_operand_resolves_to_codepoint() {
    let code = link_one(".byte 'A'\n").unwrap();
    assert_eq!(code, vec![b'A']);
}

#[test]
fn unknown_mnemonic_is_an_error() {
    let err = link_one("bogus $1 $2\n").unwrap_err();
    assert!(err.contains("bogus"));
}
