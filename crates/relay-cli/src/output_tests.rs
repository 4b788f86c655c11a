// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn handle_list_prints_empty_message_for_text_format() {
    let items: Vec<u32> = vec![];
    handle_list(OutputFormat::Text, &items, "no units", |_, _| unreachable!()).unwrap();
}

#[test]
fn handle_list_json_serializes_items() {
    let items = vec![1u32, 2, 3];
    handle_list(OutputFormat::Json, &items, "no units", |_, _| unreachable!()).unwrap();
}
