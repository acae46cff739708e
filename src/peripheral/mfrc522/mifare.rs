use esp_idf_svc::sys::TickType_t;

use super::{
    consts::{PCDErrorCode, PICCCommand},
    MfrcDriver, MFRC522,
};

impl<D> MFRC522<D>
where
    D: MfrcDriver,
{
    pub fn mifare_read(
        &mut self,
        block_addr: u8,
        buff: &mut [u8],
        buff_size: &mut u8,
        timeout: TickType_t,
    ) -> Result<(), PCDErrorCode> {
        if *buff_size < 18 {
            return Err(PCDErrorCode::NoRoom);
        }

        buff[0] = PICCCommand::PICC_CMD_MF_READ;
        buff[1] = block_addr;

        let mut tmp_buff = [0; 2];
        tmp_buff.copy_from_slice(&buff[..2]);
        self.pcd_calc_crc(&tmp_buff, 2, &mut buff[2..], timeout)?;

        let mut tmp_buff = [0; 4];
        tmp_buff.copy_from_slice(&buff[..4]);

        self.pcd_transceive_data(&tmp_buff, 4, buff, Some(buff_size), None, 0, true, timeout)
    }

    pub fn mifare_write(
        &mut self,
        block_addr: u8,
        buff: &[u8],
        buff_size: u8,
        timeout: TickType_t,
    ) -> Result<(), PCDErrorCode> {
        if buff_size < 16 {
            return Err(PCDErrorCode::Invalid);
        }

        let cmd_buff = [PICCCommand::PICC_CMD_MF_WRITE, block_addr];
        self.pcd_mifare_transceive(&cmd_buff, 2, false, timeout)?;
        self.pcd_mifare_transceive(buff, buff_size, false, timeout)?;

        Ok(())
    }
}
