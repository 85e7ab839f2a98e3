extern crate proc_macro;
use proc_macro::TokenStream;
use quote::quote;
use syn::parse::{Parse, ParseStream};
use syn::{bracketed, parse_macro_input, token, Expr, Ident, Result, Token};

#[derive(Debug)]
struct AsmStatements {
    pub statements: Vec<AsmStatement>,
}

#[derive(Debug)]
enum Operand {
    /// Everything that doesn't fit, used as an immediate so give literals a type (`0u8`)
    Expr(Expr),
    /// RSI/AL/others
    Ident(Ident),
    /// [RSI] or [RSI + (expr)], the displacement is always 4 bytes
    MemoryRegister(Ident, Option<Expr>),
}

#[derive(Debug)]
struct AsmStatement {
    mnemonic: Ident,
    operands: Vec<Operand>,
}

fn parse_operands(input: ParseStream) -> Result<Vec<Operand>> {
    let mut result = vec![];
    if input.peek(Token![;]) {
        input.parse::<Token![;]>()?;
        return Ok(result);
    }

    loop {
        let lookahead = input.lookahead1();
        if lookahead.peek(Ident) {
            let register: Ident = input.parse()?;
            result.push(Operand::Ident(register))
        } else if lookahead.peek(token::Bracket) {
            let content;
            bracketed!(content in input);
            let register: Ident = content.parse()?;
            let displacement = if content.peek(Token![+]) {
                content.parse::<Token![+]>()?;
                Some(content.parse()?)
            } else {
                None
            };
            result.push(Operand::MemoryRegister(register, displacement));
        } else {
            result.push(Operand::Expr(input.parse()?))
        }

        if input.peek(Token![;]) {
            input.parse::<Token![;]>()?;
            break Ok(result);
        } else {
            input.parse::<Token![,]>()?;
        }
    }
}

impl Parse for AsmStatements {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut statements = vec![];

        while !input.is_empty() {
            let mnemonic: Ident = input.parse()?;
            statements.push(AsmStatement {
                operands: parse_operands(input)?,
                mnemonic,
            });
        }

        Ok(AsmStatements { statements })
    }
}

/// `(offset)` is only there to get past the operand parser, the generated call doesn't need it
fn unparen(mut expr: &Expr) -> &Expr {
    while let Expr::Paren(inner) = expr {
        expr = &*inner.expr;
    }
    expr
}

fn encode_memory(register: &Ident, displacement: &Option<Expr>) -> proc_macro2::TokenStream {
    match displacement.as_ref().map(unparen) {
        Some(expr @ (Expr::Path(_) | Expr::Lit(_))) => quote! {
            MemoryBaseRegister::DisplacementOnly(registers::#register, Displacement::FourByteDisplacement(#expr as u32))
        },
        Some(expr) => quote! {
            MemoryBaseRegister::DisplacementOnly(registers::#register, Displacement::FourByteDisplacement((#expr) as u32))
        },
        None => quote! {
            MemoryBaseRegister::DisplacementOnly(registers::#register, Displacement::ZeroByteDisplacement)
        },
    }
}

fn encode_operands(mnemonic: &Ident, operands: &[Operand]) -> Result<proc_macro2::TokenStream> {
    Ok(match operands {
        [Operand::Ident(ident), Operand::Expr(expr)] => {
            let immediate = unparen(expr);
            quote! {
                OperandEncoding::MemoryImmediate(MemoryBaseRegister::Register(registers::#ident), Immediate::from(#immediate))
            }
        }
        [Operand::MemoryRegister(ident, displacement), Operand::Expr(expr)] => {
            let memory = encode_memory(ident, displacement);
            let immediate = unparen(expr);
            quote! {
                OperandEncoding::MemoryImmediate(#memory, Immediate::from(#immediate))
            }
        }
        [Operand::MemoryRegister(ident, displacement), Operand::Ident(register)] => {
            let memory = encode_memory(ident, displacement);
            quote! {
                OperandEncoding::MemoryRegister(#memory, registers::#register)
            }
        }
        [Operand::Ident(register), Operand::MemoryRegister(ident, displacement)] => {
            let memory = encode_memory(ident, displacement);
            quote! {
                OperandEncoding::RegisterMemory(registers::#register, #memory)
            }
        }
        [Operand::Ident(dst), Operand::Ident(src)] => quote! {
            OperandEncoding::MemoryRegister(MemoryBaseRegister::Register(registers::#dst), registers::#src)
        },
        [Operand::Expr(expr)] => {
            let immediate = unparen(expr);
            quote! {
                OperandEncoding::Relative(Immediate::from(#immediate))
            }
        }
        _ => {
            return Err(syn::Error::new(
                mnemonic.span(),
                format!("unsupported operands for `{}`", mnemonic),
            ))
        }
    })
}

/// Turns assembly-like statements into calls to the encoder:
///
/// ```ignore
/// asm_x86! {
///     mov AL, [RSI];
///     add [RSI + (offset)], AL;
///     syscall;
/// }
/// ```
///
/// expands to `emit(buffer, ops::mov(...))?;` per statement so the caller needs `buffer`,
/// `emit` and the encoder types in scope.
#[proc_macro]
pub fn asm_x86(stream: TokenStream) -> TokenStream {
    let input = parse_macro_input!(stream as AsmStatements);

    input
        .statements
        .into_iter()
        .map(|statement: AsmStatement| -> TokenStream {
            let mnemonic = statement.mnemonic;
            if statement.operands.is_empty() {
                return quote! {
                    emit(buffer, ops::#mnemonic())?;
                }
                .into();
            }

            match encode_operands(&mnemonic, &statement.operands) {
                Ok(tree) => quote! {
                    emit(buffer, ops::#mnemonic(#tree))?;
                }
                .into(),
                Err(error) => error.to_compile_error().into(),
            }
        })
        .collect()
}
