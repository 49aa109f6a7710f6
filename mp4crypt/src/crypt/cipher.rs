use aes::{
    Aes128,
    cipher::{
        BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, KeyInit, KeyIvInit,
        block_padding::Pkcs7, generic_array::GenericArray,
    },
};

pub type Aes128Ctr = ctr::Ctr128BE<Aes128>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// AES-128 primitive shared by every scheme.
#[derive(Clone)]
pub struct BlockCipher {
    key: [u8; 16],
    aes: Aes128,
}

impl BlockCipher {
    pub fn new(key: &[u8; 16]) -> Self {
        Self {
            key: *key,
            aes: Aes128::new(GenericArray::from_slice(key)),
        }
    }

    /// Encrypt a single block, used for IV derivation.
    pub fn encrypt_block(&self, block: [u8; 16]) -> [u8; 16] {
        let mut output = block;
        self.aes
            .encrypt_block(GenericArray::from_mut_slice(&mut output));
        output
    }

    /// CTR keystream starting at `counter_block`.
    pub fn ctr(&self, counter_block: &[u8; 16]) -> Aes128Ctr {
        Aes128Ctr::new((&self.key).into(), counter_block.into())
    }

    /// CBC encrypt the whole blocks of `data` in place.
    ///
    /// `chain` holds the IV on entry and the last ciphertext block on return.
    /// A trailing partial block is left untouched.
    pub fn cbc_encrypt(&self, chain: &mut [u8; 16], data: &mut [u8]) {
        for block in data.chunks_exact_mut(16) {
            for (x, y) in block.iter_mut().zip(chain.iter()) {
                *x ^= y;
            }

            let block = GenericArray::from_mut_slice(block);
            self.aes.encrypt_block(block);
            chain.copy_from_slice(block.as_slice());
        }
    }

    /// CBC decrypt the whole blocks of `data` in place.
    pub fn cbc_decrypt(&self, chain: &mut [u8; 16], data: &mut [u8]) {
        for block in data.chunks_exact_mut(16) {
            let mut ciphertext = [0; 16];
            ciphertext.copy_from_slice(block);
            self.aes.decrypt_block(GenericArray::from_mut_slice(block));

            for (x, y) in block.iter_mut().zip(chain.iter()) {
                *x ^= y;
            }

            *chain = ciphertext;
        }
    }

    /// AES-128-CBC with PKCS#7 padding.
    pub fn cbc_encrypt_padded(&self, iv: &[u8; 16], data: &[u8]) -> Result<Vec<u8>, String> {
        let mut buf = vec![0; data.len() + 16 - data.len() % 16];
        buf[..data.len()].copy_from_slice(data);

        let len = Aes128CbcEnc::new((&self.key).into(), iv.into())
            .encrypt_padded_mut::<Pkcs7>(&mut buf, data.len())
            .map_err(|x| x.to_string())?
            .len();

        buf.truncate(len);
        Ok(buf)
    }

    /// Reverse of [`BlockCipher::cbc_encrypt_padded`].
    pub fn cbc_decrypt_padded(&self, iv: &[u8; 16], data: &[u8]) -> Result<Vec<u8>, String> {
        let mut buf = data.to_vec();

        let len = Aes128CbcDec::new((&self.key).into(), iv.into())
            .decrypt_padded_mut::<Pkcs7>(&mut buf)
            .map_err(|x| x.to_string())?
            .len();

        buf.truncate(len);
        Ok(buf)
    }
}
