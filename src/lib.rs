// typepack: compile-time type reflection for a structurally-typed
// surface language. Walks declarations during compilation, compiles
// their static type signatures to a compact instruction stream, and
// attaches the packed result to the emitted program for a runtime
// library to decode.
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

#[macro_use]
extern crate lazy_static;

pub mod ast;
pub mod bytecode;
pub mod checker;
pub mod config;
pub mod decorator;
pub mod extractor;
pub mod reflection;
pub mod resolver;
pub mod transformer;
