// memfuzz: featherweight memory-inspection engine.
//
// Copyright (C) 2019  Brandon Lewis
//
// This program is free software: you can redistribute it and/or
// modify it under the terms of the GNU Lesser General Public License
// as published by the Free Software Foundation, either version 3 of
// the License, or (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the GNU
// Lesser General Public License for more details.
//
// You should have received a copy of the GNU Lesser General Public
// License along with this program.  If not, see
// <https://www.gnu.org/licenses/>.

use std::env::args;

use memfuzz::engine;
use memfuzz::memory::{BufferTarget, MemoryTarget, Prot};
use memfuzz::value::Value;

/// A thin, non-interactive demo: builds a small in-memory target
/// pre-populated with a few known values, parses one expression given
/// on the command line, evaluates it once, and prints the result and
/// its diagnostic RPN form. This is a stand-in for the interactive
/// shell, not the shell itself.
fn main() {
    let expr_src = match args().nth(1) {
        Some(s) => s,
        None => {
            println!("No expression given, evaluating a default demo expression.");
            "*(s32*)0x1000 + 1".to_string()
        }
    };

    let mut target = BufferTarget::new_32(0x10000);
    target.add_region("demo", 0x1000, 0x100, Prot::R | Prot::W).expect("region fits buffer");
    target.write(0x1000, &7i32.to_le_bytes()).expect("region is writable");

    match engine::compile(
        &expr_src,
        memfuzz::value::ValueType::U32,
        memfuzz::value::ValueType::S32,
    ) {
        Ok(compiled) => match engine::peek(&compiled, &target, 0x1000) {
            Ok(value) => print_result(&expr_src, value),
            Err(e) => eprintln!("evaluation failed: {}", e),
        },
        Err(e) => eprintln!("parse failed: {}", e),
    }
}

fn print_result(src: &str, value: Value) {
    println!("{} => {} ({})", src, value.get_type(), describe(&value));
}

fn describe(v: &Value) -> String {
    format!("{:?}", v)
}
