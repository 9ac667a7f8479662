//! Call payload encoding

use ethabi::token::{LenientTokenizer, Tokenizer};
use ethabi::{Contract, Function, Token};
use types::Bytes;

use crate::error::AbiError;

/// Encodes calls to one ABI function
#[derive(Debug, Clone)]
pub struct CallEncoder {
    function: Function,
}

impl CallEncoder {
    /// First overload of `name` in `contract`.
    pub fn from_contract(contract: &Contract, name: &str) -> Result<Self, AbiError> {
        let function = contract
            .function(name)
            .map_err(|_| AbiError::UnknownFunction(name.to_string()))?;
        Ok(Self {
            function: function.clone(),
        })
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }

    /// First four bytes of `keccak256(signature)`
    pub fn selector(&self) -> [u8; 4] {
        self.function.short_signature()
    }

    /// Tokenize human-readable arguments against the parameter types, then encode.
    ///
    /// Integers are decimal, optionally with a unit (`"0.01 ether"`);
    /// addresses are hex without the `0x` prefix.
    pub fn encode_args<S: AsRef<str>>(&self, args: &[S]) -> Result<Bytes, AbiError> {
        let expected = self.function.inputs.len();
        if args.len() != expected {
            return Err(AbiError::ArgumentCount {
                function: self.function.name.clone(),
                expected,
                got: args.len(),
            });
        }

        let tokens = self
            .function
            .inputs
            .iter()
            .zip(args)
            .enumerate()
            .map(|(index, (param, arg))| {
                LenientTokenizer::tokenize(&param.kind, arg.as_ref()).map_err(|e| {
                    AbiError::Encode {
                        function: self.function.name.clone(),
                        index,
                        message: e.to_string(),
                    }
                })
            })
            .collect::<Result<Vec<Token>, AbiError>>()?;

        self.encode_tokens(&tokens)
    }

    pub fn encode_tokens(&self, tokens: &[Token]) -> Result<Bytes, AbiError> {
        self.function
            .encode_input(tokens)
            .map(Bytes::from)
            .map_err(|e| AbiError::Encode {
                function: self.function.name.clone(),
                index: 0,
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::parse_abi;
    use types::U256;

    const POOL_ABI: &str = r#"[
        {"type":"function","name":"presale","stateMutability":"payable",
         "inputs":[{"name":"amount","type":"uint256"}],"outputs":[]},
        {"type":"function","name":"enablePresale","stateMutability":"nonpayable",
         "inputs":[],"outputs":[]},
        {"type":"function","name":"transfer","stateMutability":"nonpayable",
         "inputs":[{"name":"to","type":"address"},{"name":"value","type":"uint256"}],
         "outputs":[{"name":"","type":"bool"}]}
    ]"#;

    fn encoder(name: &str) -> CallEncoder {
        CallEncoder::from_contract(&parse_abi(POOL_ABI, "test").unwrap(), name).unwrap()
    }

    #[test]
    fn test_presale_encoding() {
        let presale = encoder("presale");
        let data = presale.encode_args(&["1000"]).unwrap();

        assert_eq!(data.len(), 4 + 32);
        assert_eq!(&data[..4], &presale.selector());
        assert_eq!(U256::from_big_endian(&data[4..]), U256::from(1000u64));
    }

    #[test]
    fn test_known_selectors() {
        // transfer(address,uint256)
        assert_eq!(encoder("transfer").selector(), [0xa9, 0x05, 0x9c, 0xbb]);
        assert_eq!(
            encoder("enablePresale").encode_args::<&str>(&[]).unwrap().len(),
            4
        );
    }

    #[test]
    fn test_address_arguments() {
        let data = encoder("transfer")
            .encode_args(&["dac17f958d2ee523a2206206994597c13d831ec7", "16"])
            .unwrap();
        let to: types::Address = "0xdac17f958d2ee523a2206206994597c13d831ec7".parse().unwrap();
        assert_eq!(&data[4 + 12..4 + 32], to.as_bytes());
        assert_eq!(U256::from_big_endian(&data[36..68]), U256::from(16u64));
    }

    #[test]
    fn test_argument_errors() {
        let presale = encoder("presale");
        assert!(matches!(
            presale.encode_args::<&str>(&[]),
            Err(AbiError::ArgumentCount { expected: 1, got: 0, .. })
        ));
        assert!(matches!(
            presale.encode_args(&["not-a-number"]),
            Err(AbiError::Encode { index: 0, .. })
        ));
        assert!(matches!(
            CallEncoder::from_contract(&parse_abi(POOL_ABI, "test").unwrap(), "withdraw"),
            Err(AbiError::UnknownFunction(_))
        ));
    }
}
