//! Integration tests for Layer 1: Language
//!
//! Tests for the compiler and VM working together on whole scripts.

mod compiler;
mod exceptions;
mod vm;
